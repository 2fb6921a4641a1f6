pub mod graphql;
pub mod queries;

pub use graphql::{GatewayError, GraphQlClient, QueryGateway};
