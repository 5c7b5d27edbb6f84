use std::fmt;

/// Destination of a message: an exchange and the routing key to publish with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Routing {
    exchange_name: String,
    routing_key: String,
}

impl Routing {
    pub fn new(exchange_name: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            exchange_name: exchange_name.into(),
            routing_key: routing_key.into(),
        }
    }

    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }
}

impl fmt::Display for Routing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.exchange_name, self.routing_key)
    }
}
