//! # Action Descriptors
//!
//! An action is declared once with typed input and output. At registration
//! the handler is erased to JSON in/out so one registry can hold every action
//! and the same entry serves local calls and calls arriving from another zone.

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared_types::{ActionError, ActionId, ConcurrencyKey, Zone};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Future returned by an erased handler.
pub type ActionFuture = BoxFuture<'static, Result<Value, ActionError>>;

/// Handler with JSON input and output, called with the ambient context `C`.
pub type ErasedHandler<C> = Arc<dyn Fn(C, Value) -> ActionFuture + Send + Sync>;

// =============================================================================
// DECLARATION
// =============================================================================

/// Declaration in progress: id, zone, and optional concurrency key.
///
/// Becomes an `ActionDescriptor` once given a handler with `execute`.
pub struct DescriptorBuilder<I, O, C> {
    id: ActionId,
    zone: Zone,
    concurrency: Option<ConcurrencyKey>,
    _types: PhantomData<fn(C, I) -> O>,
}

impl<I, O, C> DescriptorBuilder<I, O, C> {
    /// Serialize invocations under `key`.
    ///
    /// A number limits this action to that many concurrent executions; a
    /// string names a key shared with every other action declaring it.
    #[must_use]
    pub fn concurrency(mut self, key: impl Into<ConcurrencyKey>) -> Self {
        self.concurrency = Some(key.into());
        self
    }

    /// Attach the handler, completing the descriptor.
    ///
    /// Input is decoded from JSON before the handler runs and output is
    /// encoded after it settles; either failure is `ActionError::Codec`.
    pub fn execute<F, Fut>(self, handler: F) -> ActionDescriptor<I, O, C>
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        C: Send + 'static,
        F: Fn(C, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ActionError>> + Send + 'static,
    {
        let id = self.id.clone();
        let erased: ErasedHandler<C> = Arc::new(move |ctx: C, input: Value| -> ActionFuture {
            let input = match serde_json::from_value::<I>(input) {
                Ok(input) => input,
                Err(e) => {
                    let err = ActionError::codec(format!("invalid input for {id}: {e}"));
                    return Box::pin(async move { Err(err) });
                }
            };

            let running = handler(ctx, input);
            let id = id.clone();
            Box::pin(async move {
                let output = running.await?;
                serde_json::to_value(output)
                    .map_err(|e| ActionError::codec(format!("invalid output from {id}: {e}")))
            })
        });

        ActionDescriptor {
            id: self.id,
            zone: self.zone,
            concurrency: self.concurrency,
            handler: erased,
            _types: PhantomData,
        }
    }
}

/// Complete declaration of an action.
pub struct ActionDescriptor<I, O, C> {
    id: ActionId,
    zone: Zone,
    concurrency: Option<ConcurrencyKey>,
    handler: ErasedHandler<C>,
    _types: PhantomData<fn(C, I) -> O>,
}

impl<I, O, C> ActionDescriptor<I, O, C> {
    /// Start declaring an action with a globally unique `id`, owned by `zone`.
    pub fn builder(id: impl Into<ActionId>, zone: Zone) -> DescriptorBuilder<I, O, C> {
        DescriptorBuilder {
            id: id.into(),
            zone,
            concurrency: None,
            _types: PhantomData,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ActionId {
        &self.id
    }

    #[must_use]
    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub(crate) fn into_parts(self) -> (Action<I, O>, ActionEntry<C>) {
        let handle = Action {
            id: self.id.clone(),
            zone: self.zone,
            concurrency: self.concurrency.clone(),
            _io: PhantomData,
        };
        let entry = ActionEntry {
            id: self.id,
            zone: self.zone,
            concurrency: self.concurrency,
            handler: self.handler,
        };
        (handle, entry)
    }
}

// =============================================================================
// REGISTERED FORMS
// =============================================================================

/// Typed handle to a registered action. This is what callers invoke.
pub struct Action<I, O> {
    id: ActionId,
    zone: Zone,
    concurrency: Option<ConcurrencyKey>,
    _io: PhantomData<fn(I) -> O>,
}

impl<I, O> Action<I, O> {
    #[must_use]
    pub fn id(&self) -> &ActionId {
        &self.id
    }

    #[must_use]
    pub fn zone(&self) -> Zone {
        self.zone
    }

    #[must_use]
    pub fn concurrency(&self) -> Option<&ConcurrencyKey> {
        self.concurrency.as_ref()
    }
}

impl<I, O> Clone for Action<I, O> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            zone: self.zone,
            concurrency: self.concurrency.clone(),
            _io: PhantomData,
        }
    }
}

impl<I, O> fmt::Debug for Action<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("zone", &self.zone)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

/// Type-erased registry entry.
pub struct ActionEntry<C> {
    id: ActionId,
    zone: Zone,
    concurrency: Option<ConcurrencyKey>,
    handler: ErasedHandler<C>,
}

impl<C> ActionEntry<C> {
    #[must_use]
    pub fn id(&self) -> &ActionId {
        &self.id
    }

    #[must_use]
    pub fn zone(&self) -> Zone {
        self.zone
    }

    #[must_use]
    pub fn concurrency(&self) -> Option<&ConcurrencyKey> {
        self.concurrency.as_ref()
    }

    /// Run the handler. Concurrency gating is the caller's job.
    pub fn invoke(&self, ctx: C, input: Value) -> ActionFuture {
        (self.handler)(ctx, input)
    }
}

impl<C> Clone for ActionEntry<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            zone: self.zone,
            concurrency: self.concurrency.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<C> fmt::Debug for ActionEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionEntry")
            .field("id", &self.id)
            .field("zone", &self.zone)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}
