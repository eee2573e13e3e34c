use serenity::all::{Cache, CacheHttp, Http};
use std::sync::Arc;

/// A cache+http pair that model calls can borrow without dragging a
/// full client context around
#[derive(Clone)]
pub struct CacheHttpImpl {
    pub cache: Arc<Cache>,
    pub http: Arc<Http>,
}

impl CacheHttpImpl {
    pub fn from_ctx(ctx: &serenity::all::Context) -> Self {
        Self {
            cache: ctx.cache.clone(),
            http: ctx.http.clone(),
        }
    }
}

impl CacheHttp for CacheHttpImpl {
    fn http(&self) -> &Http {
        &self.http
    }

    fn cache(&self) -> Option<&Arc<Cache>> {
        Some(&self.cache)
    }
}
