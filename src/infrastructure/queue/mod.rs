pub mod channel;
pub mod rabbitmq;
