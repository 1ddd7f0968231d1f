#![forbid(unsafe_code)]

//! Integration tests: binder state machine against a two-level probe family.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bindery_core::{Constant, Dynamic, Lifetime, Variable};
use bindery_runtime::{
    ApplyBinding, AssociatedObjects, BaseBinding, BasePreparer, Binder, BinderConfig, BinderPhase,
    BinderStorage, Binding, BindingName, DelegateProtocol, DelegateSlot, DynamicDelegate,
    NativeObject, ObjectStorage, PrepareBinding, Preparer, Selector, bindings, inherit_bindings,
};

// ============================================================================
// Probe family
// ============================================================================

const PING: Selector = Selector::new("ping");

enum ProbeProtocol {}

impl DelegateProtocol for ProbeProtocol {
    const NAME: &'static str = "ProbeDelegate";
    const SELECTORS: &'static [Selector] = &[PING];
}

#[derive(Default)]
struct Probe {
    objects: AssociatedObjects,
    delegate: DelegateSlot,
    flavor: &'static str,
    width: Cell<i32>,
    log: RefCell<Vec<String>>,
}

impl Probe {
    fn record(&self, entry: impl Into<String>) {
        self.log.borrow_mut().push(entry.into());
    }
}

impl NativeObject for Probe {
    fn associated_objects(&self) -> &AssociatedObjects {
        &self.objects
    }
}

enum ProbeBinding {
    Inherited(BaseBinding),
    Flavor(Constant<&'static str>),
    Width(Dynamic<i32>),
    Ping(Rc<dyn Fn(u32) -> u32>),
}

impl Binding for ProbeBinding {
    fn name(&self) -> BindingName {
        match self {
            Self::Inherited(base) => base.name(),
            Self::Flavor(_) => BindingName::new("Probe", "flavor"),
            Self::Width(_) => BindingName::new("Probe", "width"),
            Self::Ping(_) => BindingName::new("Probe", "ping"),
        }
    }
}

inherit_bindings!(ProbeBinding => BaseBinding);

#[derive(Default)]
struct ProbePreparer {
    inherited: BasePreparer,
    flavor: Option<&'static str>,
    delegate: Option<DynamicDelegate<ProbeProtocol>>,
}

impl PrepareBinding for ProbePreparer {
    type Binding = ProbeBinding;

    fn prepare_binding(&mut self, binding: &ProbeBinding) {
        match binding {
            ProbeBinding::Inherited(base) => self.inherited.prepare_binding(base),
            ProbeBinding::Flavor(flavor) => self.flavor = Some(*flavor.value()),
            ProbeBinding::Ping(handler) => {
                let handler = Rc::clone(handler);
                self.delegate
                    .get_or_insert_with(DynamicDelegate::new)
                    .add_handler(PING, move |n: u32| handler(n));
            }
            ProbeBinding::Width(_) => {}
        }
    }
}

type ProbeStorage = ObjectStorage<ProbeProtocol>;

impl ApplyBinding<Probe, ProbeStorage> for ProbePreparer {
    fn check_instance(&self, instance: &Rc<Probe>, storage: &Rc<ProbeStorage>) {
        if storage.in_use() {
            instance.delegate.ensure_vacant(Self::NAME);
        }
    }

    fn prepare_instance(&mut self, instance: &Rc<Probe>, storage: &Rc<ProbeStorage>) {
        self.inherited.prepare_instance(instance, storage);
        if storage.in_use() {
            instance.delegate.install(Self::NAME, Rc::clone(storage) as _);
        }
    }

    fn apply_binding(
        &mut self,
        binding: ProbeBinding,
        instance: &Rc<Probe>,
        storage: &Rc<ProbeStorage>,
    ) -> Option<Lifetime> {
        match binding {
            ProbeBinding::Inherited(base) => self.inherited.apply_binding(base, instance, storage),
            ProbeBinding::Flavor(_) | ProbeBinding::Ping(_) => None,
            ProbeBinding::Width(width) => width.apply(instance, storage, |probe, _, value| {
                probe.width.set(value);
                probe.record(format!("width={value}"));
            }),
        }
    }

    fn finalize_instance(
        &mut self,
        instance: &Rc<Probe>,
        storage: &Rc<ProbeStorage>,
    ) -> Option<Lifetime> {
        self.inherited.finalize_instance(instance, storage)
    }
}

impl Preparer for ProbePreparer {
    const NAME: &'static str = "Probe";

    type Instance = Probe;
    type Storage = ProbeStorage;
    type Parameters = Option<&'static str>;

    fn construct_storage(&mut self) -> Rc<ProbeStorage> {
        Rc::new(ObjectStorage::new(self.delegate.take()))
    }

    fn take_parameters(&mut self) -> Option<&'static str> {
        self.flavor.take()
    }

    fn construct_instance(flavor: Option<&'static str>) -> Rc<Probe> {
        Rc::new(Probe {
            flavor: flavor.unwrap_or("plain"),
            ..Probe::default()
        })
    }
}

type ProbeBinder = Binder<ProbePreparer>;

fn ping(handler: impl Fn(u32) -> u32 + 'static) -> ProbeBinding {
    ProbeBinding::Ping(Rc::new(handler))
}

// ============================================================================
// State machine
// ============================================================================

#[test]
fn instance_is_constructed_once() {
    let binder = ProbeBinder::new(bindings![ProbeBinding::Width(Dynamic::fixed(3))]);
    assert_eq!(binder.phase(), BinderPhase::Pending);

    let first = binder.instance();
    let second = binder.instance();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(binder.phase(), BinderPhase::Constructed);
    assert_eq!(*first.log.borrow(), vec!["width=3"]);
}

#[test]
fn constants_reach_construction() {
    let binder = ProbeBinder::new(bindings![ProbeBinding::Flavor(Constant::new("mint"))]);
    assert_eq!(binder.instance().flavor, "mint");

    let plain = ProbeBinder::new(Vec::new());
    assert_eq!(plain.instance().flavor, "plain");
}

#[test]
fn factory_receives_parameters() {
    let binder = ProbeBinder::with_factory(
        |flavor| {
            Rc::new(Probe {
                flavor: flavor.map_or("none", |_| "custom"),
                ..Probe::default()
            })
        },
        bindings![ProbeBinding::Flavor(Constant::new("mint"))],
    );
    assert_eq!(binder.instance().flavor, "custom");
}

#[test]
fn external_instance_is_bound_in_place() {
    let probe = Rc::new(Probe::default());
    let width = Variable::new(1);
    let binder = ProbeBinder::new(bindings![ProbeBinding::Width(width.signal().into())]);
    binder.apply_bindings(&probe);

    assert!(Rc::ptr_eq(&binder.instance(), &probe));
    width.set(9);
    assert_eq!(probe.width.get(), 9);
}

#[test]
fn storage_is_associated_with_instance() {
    let binder = ProbeBinder::new(Vec::new());
    let instance = binder.instance();
    let storage = binder.storage();
    let attached = instance
        .associated_objects()
        .get_as::<ProbeStorage>(bindery_runtime::STORAGE_KEY)
        .expect("storage attached");
    assert!(Rc::ptr_eq(&attached, &storage));
}

#[test]
fn cancel_stops_updates() {
    let width = Variable::new(1);
    let binder = ProbeBinder::new(bindings![ProbeBinding::Width(width.signal().into())]);
    let probe = binder.instance();
    width.set(2);
    binder.cancel();
    binder.cancel();
    width.set(3);
    assert!(binder.is_cancelled());
    assert_eq!(probe.width.get(), 2);
    assert_eq!(width.signal().observer_count(), 0);
}

#[test]
fn cancel_before_construction_is_a_no_op() {
    let binder = ProbeBinder::new(Vec::new());
    binder.cancel();
    assert!(!binder.is_cancelled());
    assert_eq!(binder.phase(), BinderPhase::Pending);
}

#[test]
fn dropping_instance_and_binder_releases_subscriptions() {
    let width = Variable::new(1);
    {
        let binder = ProbeBinder::new(bindings![ProbeBinding::Width(width.signal().into())]);
        let _ = binder.instance();
        assert_eq!(width.signal().observer_count(), 1);
    }
    assert_eq!(width.signal().observer_count(), 0);
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn phases_run_in_order() {
    let binder = ProbeBinder::new(bindings![
        BaseBinding::ad_hoc_finalize(|probe: &Probe| {
            probe.record("finalize");
            None
        }),
        ProbeBinding::Width(Dynamic::fixed(1)),
        BaseBinding::ad_hoc_prepare(|probe: &Probe| probe.record("prepare")),
        ProbeBinding::Width(Dynamic::fixed(2)),
    ]);
    let probe = binder.instance();
    assert_eq!(
        *probe.log.borrow(),
        vec!["prepare", "width=1", "width=2", "finalize"]
    );
    assert_eq!(probe.width.get(), 2);
}

// ============================================================================
// Delegates
// ============================================================================

#[test]
fn delegate_installed_only_when_needed() {
    let quiet = ProbeBinder::new(Vec::new());
    assert!(!quiet.instance().delegate.is_occupied());
    assert!(!quiet.storage().in_use());

    let chatty = ProbeBinder::new(bindings![ping(|n| n * 2)]);
    let probe = chatty.instance();
    assert!(probe.delegate.responds_to(PING));
    assert_eq!(probe.delegate.send::<u32, u32>(PING, 21), Some(42));
}

#[test]
#[should_panic(expected = "conflicting delegate: Probe")]
fn second_delegate_binder_conflicts() {
    let probe = Rc::new(Probe::default());
    ProbeBinder::new(bindings![ping(|n| n)]).apply_bindings(&probe);
    ProbeBinder::new(bindings![ping(|n| n + 1)]).apply_bindings(&probe);
}

// ============================================================================
// Contract violations
// ============================================================================

#[test]
#[should_panic(expected = "already bound: Probe")]
fn apply_twice_panics() {
    let probe = Rc::new(Probe::default());
    let binder = ProbeBinder::new(Vec::new());
    binder.apply_bindings(&probe);
    binder.apply_bindings(&probe);
}

#[test]
#[should_panic(expected = "instance already bound: Probe")]
fn two_binders_on_one_instance_panic() {
    let probe = Rc::new(Probe::default());
    ProbeBinder::new(Vec::new()).apply_bindings(&probe);
    ProbeBinder::new(Vec::new()).apply_bindings(&probe);
}

#[test]
fn rejected_binder_leaves_instance_untouched() {
    let probe = Rc::new(Probe::default());
    let first = ProbeBinder::new(bindings![ping(|n| n * 2)]);
    first.apply_bindings(&probe);

    let touched = Rc::new(Cell::new(false));
    for second in [
        bindings![ping(|n| n + 1)],
        bindings![BaseBinding::ad_hoc_prepare::<Probe>({
            let t = Rc::clone(&touched);
            move |_| t.set(true)
        })],
    ] {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ProbeBinder::new(second).apply_bindings(&probe);
        }));
        assert!(result.is_err());
    }

    assert!(!touched.get());
    assert_eq!(probe.delegate.send::<u32, u32>(PING, 21), Some(42));
    assert!(!first.is_cancelled());
}

#[test]
#[should_panic(expected = "reentrant construction: Probe")]
fn reentrant_instance_request_panics() {
    let slot: Rc<RefCell<Option<Rc<ProbeBinder>>>> = Rc::default();
    let s = Rc::clone(&slot);
    let binder = Rc::new(ProbeBinder::new(bindings![BaseBinding::ad_hoc_prepare(
        move |_: &Probe| {
            let binder = s.borrow().clone();
            if let Some(binder) = binder {
                let _ = binder.instance();
            }
        }
    )]));
    *slot.borrow_mut() = Some(Rc::clone(&binder));
    let _ = binder.instance();
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn binding_names_resolve_through_inheritance() {
    let lifted: ProbeBinding = BaseBinding::retain(()).into();
    assert_eq!(lifted.name().to_string(), "Base.retain");
    assert_eq!(ping(|n| n).name().to_string(), "Probe.ping");
}

#[test]
fn construction_emits_span_when_tracing_bindings() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Count(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Count {
        fn on_event(
            &self,
            _event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    let count = Count::default();
    let subscriber = tracing_subscriber::registry().with(count.clone());
    tracing::subscriber::with_default(subscriber, || {
        let binder = ProbeBinder::new(bindings![
            ProbeBinding::Width(Dynamic::fixed(1)),
            ProbeBinding::Flavor(Constant::new("mint")),
        ])
        .with_config(BinderConfig::new().with_label("probe").with_trace_bindings(true));
        let _ = binder.instance();
    });
    // Two bindings in two phases, plus the closing "bound" event.
    let seen = count.0.load(Ordering::Relaxed);
    assert!(seen >= 5, "saw {seen} events");
}
