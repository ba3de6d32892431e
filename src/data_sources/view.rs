//! `coralogix_view` data source.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::clients::{views as rpc, ClientSet};
use crate::data_sources::{by_name, lookup, Lookup};
use crate::error::ProviderError;
use crate::resource::{Clients, DataSource};
use crate::resources::view::{flatten_view, get_view, view_schema, ViewModel};
use crate::schema::Schema;
use crate::sdk::views::ListViewsRequest;
use crate::transcode::{parse_id, Result};

/// Looks a saved view up by ID or by name.
#[derive(Default)]
pub struct ViewDataSource {
    clients: Clients,
}

#[async_trait]
impl DataSource for ViewDataSource {
    type Model = ViewModel;

    fn type_name(&self) -> &'static str {
        "coralogix_view"
    }

    fn schema(&self) -> Schema {
        view_schema().into_lookup(&["id", "name"])
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        self.clients.set(clients);
    }

    async fn read(&self, config: ViewModel) -> Result<ViewModel> {
        let clients = self.clients.get()?;
        match lookup(&config.id, &config.name)? {
            Lookup::Id(id) => get_view(clients, parse_id("id", id)?).await,
            Lookup::Name(name) => {
                let request = ListViewsRequest {};
                debug!(name, "Looking up view by name");
                let response = clients
                    .views
                    .list(request.clone())
                    .await
                    .map_err(|status| ProviderError::rpc(rpc::LIST_VIEWS, &request, status))?;
                let view = by_name(
                    "views",
                    name,
                    response.views.into_iter().map(|view| (view.name.clone(), view)),
                )?;
                Ok(flatten_view(view))
            },
        }
    }
}
