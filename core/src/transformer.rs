//! Interceptors around dataset load and save.
//!
//! Each dataset owns an ordered list of transformers. The first transformer in
//! the list is the outermost wrapper: it sees the call first and the result
//! last. The innermost continuation calls the dataset itself.

use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::dataset::DataSet;
use crate::error::CatalogResult;

/// Continuation that performs the rest of a load chain.
pub type LoadNext<'a> = &'a dyn Fn() -> CatalogResult<Value>;

/// Continuation that performs the rest of a save chain.
pub type SaveNext<'a> = &'a dyn Fn(Value) -> CatalogResult<()>;

/// Wraps the load and save calls of the datasets it is attached to.
///
/// Both methods default to passing straight through, so an implementation
/// only overrides the direction it cares about. A transformer may inspect or
/// replace the data, skip `next` entirely, or fail the call.
pub trait Transformer: Send + Sync + Debug {
    fn load(&self, name: &str, next: LoadNext<'_>) -> CatalogResult<Value> {
        let _ = name;
        next()
    }

    fn save(&self, name: &str, next: SaveNext<'_>, data: Value) -> CatalogResult<()> {
        let _ = name;
        next(data)
    }
}

type LoadChain<'a> = Box<dyn Fn() -> CatalogResult<Value> + 'a>;
type SaveChain<'a> = Box<dyn Fn(Value) -> CatalogResult<()> + 'a>;

/// Run a load through `chain` and finally `data_set`.
pub(crate) fn load_through<'a>(
    name: &'a str,
    data_set: &'a dyn DataSet,
    chain: &'a [Arc<dyn Transformer>],
) -> CatalogResult<Value> {
    let innermost: LoadChain<'a> = Box::new(move || data_set.load());
    let wrapped = chain
        .iter()
        .rev()
        .fold(innermost, |next, transformer| -> LoadChain<'a> {
            Box::new(move || transformer.load(name, &*next))
        });
    wrapped()
}

/// Run a save through `chain` and finally `data_set`.
pub(crate) fn save_through<'a>(
    name: &'a str,
    data_set: &'a dyn DataSet,
    chain: &'a [Arc<dyn Transformer>],
    data: Value,
) -> CatalogResult<()> {
    let innermost: SaveChain<'a> = Box::new(move |data| data_set.save(data));
    let wrapped = chain
        .iter()
        .rev()
        .fold(innermost, |next, transformer| -> SaveChain<'a> {
            Box::new(move |data| transformer.save(name, &*next, data))
        });
    wrapped(data)
}

/// Logs how long every load and save took.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfileTimeTransformer;

impl Transformer for ProfileTimeTransformer {
    fn load(&self, name: &str, next: LoadNext<'_>) -> CatalogResult<Value> {
        let start = Instant::now();
        let data = next()?;
        info!("Loading {} took {:.3} seconds", name, start.elapsed().as_secs_f64());
        Ok(data)
    }

    fn save(&self, name: &str, next: SaveNext<'_>, data: Value) -> CatalogResult<()> {
        let start = Instant::now();
        next(data)?;
        info!("Saving {} took {:.3} seconds", name, start.elapsed().as_secs_f64());
        Ok(())
    }
}
