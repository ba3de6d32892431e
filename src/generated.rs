//! Plugin host protocol types, compiled from `proto/provider.proto`.

tonic::include_proto!("provider.v1");
