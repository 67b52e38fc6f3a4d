use tokio::sync::RwLock;
use crate::storage::Catalog;

pub struct ExecutionContext<'a> {
    pub catalog: &'a RwLock<Catalog>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(catalog: &'a RwLock<Catalog>) -> Self {
        Self { catalog }
    }
}
