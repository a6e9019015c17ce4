//! Service modules
//!
//! A module is a named bundle of factories, typically one per application
//! component, handed to [`GenerationContextBuilder::module`].
//!
//! [`GenerationContextBuilder::module`]: crate::GenerationContextBuilder::module

use crate::{Result, ServiceFactory};
use std::sync::Arc;

/// Produces the factories a component contributes to a context.
///
/// # Examples
///
/// ```rust
/// use service_generator::{
///     DeclaredServiceFactory, GenerationContext, Result, ServiceFactory, ServiceModule,
/// };
/// use std::sync::Arc;
///
/// struct Defaults;
///
/// impl ServiceModule for Defaults {
///     fn assemble(&self) -> Result<Vec<Arc<dyn ServiceFactory>>> {
///         Ok(vec![Arc::new(DeclaredServiceFactory::constant("retries", "Count", 3_u32))])
///     }
/// }
///
/// let context = GenerationContext::builder().module(Defaults).build().unwrap();
/// assert!(context.contains("retries"));
/// ```
pub trait ServiceModule {
    fn assemble(&self) -> Result<Vec<Arc<dyn ServiceFactory>>>;

    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> ServiceModule for F
where
    F: Fn() -> Result<Vec<Arc<dyn ServiceFactory>>>,
{
    #[inline]
    fn assemble(&self) -> Result<Vec<Arc<dyn ServiceFactory>>> {
        self()
    }
}
