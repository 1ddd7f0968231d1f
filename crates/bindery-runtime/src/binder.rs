#![forbid(unsafe_code)]

//! The binder: a declarative recipe for one bound native object.
//!
//! A [`Binder`] holds an ordered list of bindings and, on first use, builds
//! the instance and applies them. It moves through three states:
//!
//! ```text
//! Pending ──instance()/apply_bindings()──▶ Constructing ──▶ Constructed
//! ```
//!
//! # Invariants
//!
//! 1. Bindings are applied exactly once; the instance is built at most once.
//! 2. Phase 1 sees every binding before the instance exists; phase 2
//!    applies them in list order.
//! 3. The storage is attached to the instance before any binding is
//!    applied, so it lives as long as the instance.
//! 4. A rejected binder leaves the instance untouched: the delegate and
//!    ownership checks run before `prepare_instance`.
//! 5. Every lifetime returned by phase 2 ends up in the storage's aggregate.
//!
//! # Failure Modes
//!
//! | Call | Cause | Violation |
//! |------|-------|-----------|
//! | `instance()` | Called from a binding while constructing | `ReentrantConstruction` |
//! | `apply_bindings()` | Binder already constructed | `AlreadyBound` |
//! | either | Preparer finds the delegate slot taken | `ConflictingDelegate` |
//! | either | Instance already carries a binder's storage | `InstanceAlreadyBound` |

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bindery_core::ContractViolation;
use tracing::{debug, debug_span, trace};

use crate::config::BinderConfig;
use crate::preparer::{ApplyBinding, Binding, Preparer};
use crate::storage::{BinderStorage, NativeObject, STORAGE_KEY};

type Factory<P> =
    Box<dyn FnOnce(<P as Preparer>::Parameters) -> Rc<<P as Preparer>::Instance>>;

/// Observable binder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderPhase {
    /// Bindings held, nothing constructed.
    Pending,
    /// Construction and binding application in progress.
    Constructing,
    /// Instance built and bound.
    Constructed,
}

enum State<P: Preparer> {
    Pending {
        bindings: Vec<P::Binding>,
        factory: Option<Factory<P>>,
    },
    Constructing,
    Constructed {
        instance: Rc<P::Instance>,
        storage: Rc<P::Storage>,
    },
}

impl<P: Preparer> State<P> {
    fn phase(&self) -> BinderPhase {
        match self {
            Self::Pending { .. } => BinderPhase::Pending,
            Self::Constructing => BinderPhase::Constructing,
            Self::Constructed { .. } => BinderPhase::Constructed,
        }
    }
}

/// Builds a `P::Instance` and binds it to its bindings.
pub struct Binder<P: Preparer> {
    state: RefCell<State<P>>,
    config: BinderConfig,
}

impl<P> Binder<P>
where
    P: Preparer + ApplyBinding<P::Instance, P::Storage>,
{
    /// A binder that constructs its instance with the preparer's default.
    #[must_use]
    pub fn new(bindings: Vec<P::Binding>) -> Self {
        Self {
            state: RefCell::new(State::Pending {
                bindings,
                factory: None,
            }),
            config: BinderConfig::default(),
        }
    }

    /// A binder that constructs its instance with `factory`.
    ///
    /// The factory receives the construction parameters gathered from the
    /// bindings' constants.
    #[must_use]
    pub fn with_factory(
        factory: impl FnOnce(P::Parameters) -> Rc<P::Instance> + 'static,
        bindings: Vec<P::Binding>,
    ) -> Self {
        Self {
            state: RefCell::new(State::Pending {
                bindings,
                factory: Some(Box::new(factory)),
            }),
            config: BinderConfig::default(),
        }
    }

    /// Replace the default configuration.
    #[must_use]
    pub fn with_config(mut self, config: BinderConfig) -> Self {
        self.config = config;
        self
    }

    /// The configuration this binder constructs with.
    #[must_use]
    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    /// Where the binder is in its one-way lifecycle.
    #[must_use]
    pub fn phase(&self) -> BinderPhase {
        self.state.borrow().phase()
    }

    /// The bound instance, constructing it on first call.
    ///
    /// # Panics
    ///
    /// When called while this binder is constructing, or when the factory
    /// returns an instance already bound by another binder.
    #[must_use]
    pub fn instance(&self) -> Rc<P::Instance> {
        if let State::Constructed { instance, .. } = &*self.state.borrow() {
            return Rc::clone(instance);
        }
        let (bindings, factory) = self.begin();
        let (instance, storage) = bind::<P>(bindings, &self.config, |preparer| {
            let parameters = preparer.take_parameters();
            match factory {
                Some(factory) => factory(parameters),
                None => P::construct_instance(parameters),
            }
        });
        self.finish(Rc::clone(&instance), storage);
        instance
    }

    /// Apply the bindings to an instance constructed elsewhere.
    ///
    /// Construction parameters gathered in phase 1 are discarded.
    ///
    /// # Panics
    ///
    /// When the binder was already constructed or bound, or `instance` is
    /// already bound by another binder.
    pub fn apply_bindings(&self, instance: &Rc<P::Instance>) {
        let (bindings, _factory) = self.begin();
        let (instance, storage) = bind::<P>(bindings, &self.config, |_| Rc::clone(instance));
        self.finish(instance, storage);
    }

    /// The storage attached to the instance, constructing it if needed.
    #[must_use]
    pub fn storage(&self) -> Rc<P::Storage> {
        if let State::Constructed { storage, .. } = &*self.state.borrow() {
            return Rc::clone(storage);
        }
        let _ = self.instance();
        match &*self.state.borrow() {
            State::Constructed { storage, .. } => Rc::clone(storage),
            _ => unreachable!("instance() leaves the binder constructed"),
        }
    }

    /// Cancel every applied binding. The instance stays alive but is no
    /// longer driven by or feeding any signal.
    pub fn cancel(&self) {
        let storage = match &*self.state.borrow() {
            State::Constructed { storage, .. } => Rc::clone(storage),
            _ => return,
        };
        debug!(owner = P::NAME, "cancelling bindings");
        storage.lifetime().cancel();
    }

    /// Whether [`cancel`](Self::cancel) has run on a constructed binder.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match &*self.state.borrow() {
            State::Constructed { storage, .. } => storage.lifetime().is_cancelled(),
            _ => false,
        }
    }

    fn begin(&self) -> (Vec<P::Binding>, Option<Factory<P>>) {
        let mut state = self.state.borrow_mut();
        match &*state {
            State::Pending { .. } => {}
            State::Constructing => {
                ContractViolation::ReentrantConstruction { owner: P::NAME }.raise()
            }
            State::Constructed { .. } => ContractViolation::AlreadyBound { owner: P::NAME }.raise(),
        }
        match std::mem::replace(&mut *state, State::Constructing) {
            State::Pending { bindings, factory } => (bindings, factory),
            _ => unreachable!("checked pending above"),
        }
    }

    fn finish(&self, instance: Rc<P::Instance>, storage: Rc<P::Storage>) {
        *self.state.borrow_mut() = State::Constructed { instance, storage };
    }
}

fn bind<P>(
    bindings: Vec<P::Binding>,
    config: &BinderConfig,
    make_instance: impl FnOnce(&mut P) -> Rc<P::Instance>,
) -> (Rc<P::Instance>, Rc<P::Storage>)
where
    P: Preparer + ApplyBinding<P::Instance, P::Storage>,
{
    let _span = debug_span!(
        "binder_construct",
        owner = P::NAME,
        label = config.label().unwrap_or_default(),
        bindings = bindings.len()
    )
    .entered();

    let mut preparer = P::default();
    for binding in &bindings {
        if config.trace_bindings {
            trace!(binding = %binding.name(), "prepare");
        }
        preparer.prepare_binding(binding);
    }

    let storage = preparer.construct_storage();
    let instance = make_instance(&mut preparer);

    // Nothing may touch the instance before both checks pass.
    preparer.check_instance(&instance, &storage);
    let associated = instance.associated_objects();
    if associated.contains(STORAGE_KEY) {
        ContractViolation::InstanceAlreadyBound { owner: P::NAME }.raise();
    }
    preparer.prepare_instance(&instance, &storage);
    let erased: Rc<dyn Any> = Rc::clone(&storage) as Rc<dyn Any>;
    associated.set(STORAGE_KEY, erased);

    for binding in bindings {
        if config.trace_bindings {
            trace!(binding = %binding.name(), "apply");
        }
        if let Some(lifetime) = preparer.apply_binding(binding, &instance, &storage) {
            storage.lifetime().push(lifetime);
        }
    }
    if let Some(lifetime) = preparer.finalize_instance(&instance, &storage) {
        storage.lifetime().push(lifetime);
    }

    debug!(
        lifetimes = storage.lifetime().len(),
        in_use = storage.in_use(),
        "bound"
    );
    (instance, storage)
}

impl<P: Preparer> fmt::Debug for Binder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("owner", &P::NAME)
            .field("phase", &self.state.borrow().phase())
            .field("config", &self.config)
            .finish()
    }
}
