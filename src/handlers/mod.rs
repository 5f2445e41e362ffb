pub mod access_token;
pub mod container_handlers;
pub mod customer_handlers;
pub mod health_handlers;
pub mod model_handlers;
pub mod remote_args;
pub mod remoting_handlers;
