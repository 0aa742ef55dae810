//! Generated tfplugin6 and go-plugin controller bindings.

#![allow(clippy::large_enum_variant, clippy::doc_lazy_continuation)]

tonic::include_proto!("tfplugin6");

pub use provider_server::{Provider as ProviderRpc, ProviderServer};

pub mod plugin {
    tonic::include_proto!("plugin");

    pub use grpc_controller_server::{GrpcController, GrpcControllerServer};
}
