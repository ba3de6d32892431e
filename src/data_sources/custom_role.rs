//! `coralogix_custom_role` data source.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::clients::{roles as rpc, ClientSet};
use crate::data_sources::{by_name, lookup, Lookup};
use crate::error::ProviderError;
use crate::resource::{Clients, DataSource};
use crate::resources::custom_role::{custom_role_schema, flatten_role, get_role, CustomRoleModel};
use crate::schema::Schema;
use crate::sdk::roles::ListCustomRolesRequest;
use crate::transcode::{parse_id, Result};

/// Looks a custom role up by ID or by name.
#[derive(Default)]
pub struct CustomRoleDataSource {
    clients: Clients,
}

#[async_trait]
impl DataSource for CustomRoleDataSource {
    type Model = CustomRoleModel;

    fn type_name(&self) -> &'static str {
        "coralogix_custom_role"
    }

    fn schema(&self) -> Schema {
        custom_role_schema().into_lookup(&["id", "name"])
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        self.clients.set(clients);
    }

    async fn read(&self, config: CustomRoleModel) -> Result<CustomRoleModel> {
        let clients = self.clients.get()?;
        match lookup(&config.id, &config.name)? {
            Lookup::Id(id) => get_role(clients, parse_id("id", id)?).await,
            Lookup::Name(name) => {
                let request = ListCustomRolesRequest {};
                debug!(name, "Looking up custom role by name");
                let response = clients
                    .roles
                    .list(request.clone())
                    .await
                    .map_err(|status| ProviderError::rpc(rpc::LIST_CUSTOM_ROLES, &request, status))?;
                let role = by_name(
                    "custom roles",
                    name,
                    response.roles.into_iter().map(|role| (role.name.clone(), role)),
                )?;
                Ok(flatten_role(role))
            },
        }
    }
}
