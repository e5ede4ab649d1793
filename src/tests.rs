use std::{
    cell::Cell,
    rc::{self, Rc},
};

use crate::*;

#[derive(Default, Debug)]
struct Counter
{
    hits: Cell<u32>,
}

impl Counter
{
    fn bump(&self) { self.hits.set(self.hits.get() + 1) }
    fn add(&self, n: u32) { self.hits.set(self.hits.get() + n) }
    fn add_both(&self, a: u32, b: u32) -> u32
    {
        self.add(a + b);
        self.hits.get()
    }
    fn hits(&self) -> u32 { self.hits.get() }
}

struct DropIncrementer<'c>(&'c Cell<i32>);

impl Drop for DropIncrementer<'_>
{
    fn drop(&mut self) { self.0.set(self.0.get() + 1); }
}

trait Named
{
    fn name(&self) -> String;
}

trait Greeter: Named
{
    fn greet(&self) -> String { format!("hello from {}", self.name()) }
}

struct Robot
{
    serial: u32,
    drops: Rc<Cell<i32>>,
}

impl Named for Robot
{
    fn name(&self) -> String { format!("robot {}", self.serial) }
}

impl Greeter for Robot {}

impl Drop for Robot
{
    fn drop(&mut self) { self.drops.set(self.drops.get() + 1); }
}

crate::upcast!(Robot => dyn Named, Robot => dyn Greeter, dyn Greeter => dyn Named);

fn robot(serial: u32, drops: &Rc<Cell<i32>>) -> Robot
{
    Robot {
        serial,
        drops: drops.clone(),
    }
}

#[test]
fn user_story()
{
    let before = thread_local_stats();

    let counter = OwningHandle::new(Counter::default());
    assert_eq!(counter.mode(), Mode::Shared);

    let observer = counter.downgrade();
    assert_eq!(observer.mode(), Mode::Weak);
    assert!(observer.is_alive());

    counter.bump();
    observer.lock().bump();
    assert_eq!(counter.hits(), 2);

    let copy = counter.clone();
    assert!(copy.ptr_eq(&counter));
    assert_eq!(Rc::strong_count(counter.as_shared().unwrap()), 2);

    std::mem::drop(counter);
    assert!(observer.is_alive());
    std::mem::drop(copy);
    assert!(!observer.is_alive());

    let locked = observer.lock();
    assert_eq!(locked.mode(), Mode::Unset);
    assert!(locked.get().unwrap_err().is_null_handle());

    let after = thread_local_stats();
    assert_eq!(after.failed_locks, before.failed_locks + 1);
    assert_eq!(after.null_accesses, before.null_accesses + 1);
}

#[test]
fn unset_access_fails()
{
    let handle: OwningHandle<Counter> = OwningHandle::default();
    assert!(!handle.is_set());

    for _ in 0..3 {
        let err = handle.get().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NullHandle);
        assert_eq!(err.to_string(), "handle should not contain null pointers");
        assert!(!err.has_parent());
    }
    assert!(handle.try_get().is_none());
}

#[test]
#[should_panic(expected = "handle should not contain null pointers")]
fn unset_deref_panics()
{
    let handle: OwningHandle<Counter> = OwningHandle::Unset;
    handle.bump();
}

#[test]
fn access_is_idempotent()
{
    let counter = Counter::default();
    let raw: OwningHandle<Counter> = OwningHandle::raw(&counter);
    assert_eq!(raw.mode(), Mode::Raw);
    for _ in 0..3 {
        assert!(std::ptr::eq(raw.get().unwrap(), &counter));
    }

    let rc = Rc::new(Counter::default());
    let shared = OwningHandle::from(rc.clone());
    for _ in 0..3 {
        assert!(std::ptr::eq(shared.get().unwrap(), &*rc));
    }
}

#[test]
fn raw_clone_copies_the_borrow()
{
    let counter = Counter::default();
    let raw: OwningHandle<Counter> = (&counter).into();
    let copy = raw.clone();
    assert!(copy.ptr_eq(&raw));
    assert!(copy.as_shared().is_none());

    copy.add(4);
    assert_eq!(counter.hits(), 4);

    let weak = raw.downgrade();
    assert_eq!(weak.mode(), Mode::Raw);
}

#[test]
fn raw_weak_handles_always_lock()
{
    let counter = Counter::default();
    let weak: WeakHandle<Counter> = WeakHandle::raw(&counter);
    assert!(weak.is_alive());

    for _ in 0..3 {
        let locked = weak.lock();
        assert_eq!(locked.mode(), Mode::Raw);
        assert!(std::ptr::eq(locked.get().unwrap(), &counter));
    }
}

#[test]
fn shared_weak_handles_keep_their_target()
{
    let cell = Cell::new(0);
    let weak: WeakHandle<DropIncrementer> = Rc::new(DropIncrementer(&cell)).into();
    assert_eq!(weak.mode(), Mode::Shared);

    let locked = weak.lock();
    assert_eq!(locked.mode(), Mode::Shared);
    std::mem::drop(locked);
    assert_eq!(cell.get(), 0);

    std::mem::drop(weak);
    assert_eq!(cell.get(), 1);
}

#[test]
fn weak_handles_do_not_keep_their_target()
{
    let cell = Cell::new(0);
    let owner = Rc::new(DropIncrementer(&cell));
    let weak: WeakHandle<DropIncrementer> = Rc::downgrade(&owner).into();

    let locked = weak.lock();
    assert_eq!(locked.mode(), Mode::Shared);
    std::mem::drop(owner);
    assert_eq!(cell.get(), 0);
    assert!(weak.is_alive());

    std::mem::drop(locked);
    assert_eq!(cell.get(), 1);
    assert!(!weak.is_alive());
    assert!(!weak.lock().is_set());

    let owning: OwningHandle<DropIncrementer> = weak.into();
    assert!(!owning.is_set());
}

#[test]
fn unset_weak_handles()
{
    let weak: WeakHandle<Counter> = WeakHandle::default();
    assert_eq!(weak.mode(), Mode::Unset);
    assert!(!weak.is_alive());
    assert_eq!(weak.lock().mode(), Mode::Unset);

    let unset: OwningHandle<Counter> = OwningHandle::Unset;
    assert_eq!(unset.downgrade().mode(), Mode::Unset);
    assert!(unset.ptr_eq(&OwningHandle::Unset));
}

#[test]
fn unsized_handles_default_to_unset()
{
    let owning: OwningHandle<dyn Named> = OwningHandle::default();
    assert_eq!(owning.mode(), Mode::Unset);
    assert!(owning.get().is_err());

    let weak: WeakHandle<dyn Greeter> = WeakHandle::default();
    assert_eq!(weak.mode(), Mode::Unset);
    assert!(!weak.lock().is_set());
}

#[test]
fn upcast_shares_ownership()
{
    let drops = Rc::new(Cell::new(0));
    let derived = OwningHandle::new(robot(7, &drops));
    let spare = derived.clone();
    let watcher = derived.downgrade();

    let base: OwningHandle<dyn Named> = OwningHandle::from_derived(&derived);
    assert_eq!(base.mode(), Mode::Shared);
    assert_eq!(base.name(), "robot 7");

    std::mem::drop(derived);
    std::mem::drop(spare);
    assert_eq!(drops.get(), 0);
    assert!(watcher.is_alive());
    assert_eq!(watcher.lock().serial, 7);

    std::mem::drop(base);
    assert_eq!(drops.get(), 1);
    assert!(!watcher.is_alive());
}

#[test]
fn upcast_preserves_raw_mode()
{
    let drops = Rc::new(Cell::new(0));
    let robot = robot(3, &drops);

    let derived: OwningHandle<Robot> = OwningHandle::raw(&robot);
    let greeter: OwningHandle<dyn Greeter> = derived.upcast();
    assert_eq!(greeter.mode(), Mode::Raw);
    assert_eq!(greeter.greet(), "hello from robot 3");

    let named: OwningHandle<dyn Named> = greeter.upcast();
    assert_eq!(named.mode(), Mode::Raw);
    assert_eq!(named.name(), "robot 3");
    assert_eq!(drops.get(), 0);
}

#[test]
fn trait_object_upcasts_share_ownership()
{
    let drops = Rc::new(Cell::new(0));
    let greeter: OwningHandle<dyn Greeter> = OwningHandle::new(robot(11, &drops)).upcast();
    let named: OwningHandle<dyn Named> = greeter.clone().upcast();
    assert!(named.ptr_eq(&OwningHandle::from_derived(&greeter)));

    std::mem::drop(greeter);
    assert_eq!(named.name(), "robot 11");
    assert_eq!(drops.get(), 0);

    std::mem::drop(named);
    assert_eq!(drops.get(), 1);
}

#[test]
fn downgrade_to_shares_the_pointee()
{
    let drops = Rc::new(Cell::new(0));
    let owner = OwningHandle::new(robot(5, &drops));

    let weak: WeakHandle<dyn Named> = owner.downgrade_to();
    assert_eq!(weak.mode(), Mode::Weak);
    assert_eq!(weak.lock().name(), "robot 5");
    assert!(weak.lock().ptr_eq(&owner.clone().upcast()));

    std::mem::drop(owner);
    assert_eq!(drops.get(), 1);
    assert!(!weak.lock().is_set());

    let robot = robot(6, &drops);
    let raw: OwningHandle<Robot> = OwningHandle::raw(&robot);
    let weak: WeakHandle<dyn Greeter> = raw.downgrade_to();
    assert_eq!(weak.mode(), Mode::Raw);
    assert_eq!(weak.lock().greet(), "hello from robot 6");
}

#[test]
fn weak_handle_upcast_preserves_mode()
{
    let drops = Rc::new(Cell::new(0));
    let owner = Rc::new(robot(9, &drops));

    let weak: WeakHandle<Robot> = Rc::downgrade(&owner).into();
    let weak: WeakHandle<dyn Named> = weak.upcast();
    assert_eq!(weak.mode(), Mode::Weak);
    assert_eq!(weak.lock().name(), "robot 9");

    let shared: WeakHandle<Robot> = WeakHandle::shared(owner.clone());
    let shared: WeakHandle<dyn Greeter> = shared.upcast();
    assert_eq!(shared.mode(), Mode::Shared);

    std::mem::drop(owner);
    assert!(weak.is_alive());
    std::mem::drop(shared);
    assert!(!weak.is_alive());
}

#[test]
fn dispatch_through_holders()
{
    let counter = Counter::default();
    invoke(&counter, Counter::bump, ()).unwrap();
    invoke(&&counter, Counter::add, (2,)).unwrap();
    assert_eq!(counter.hits(), 3);

    let boxed = Box::new(Counter::default());
    assert_eq!(invoke(&boxed, Counter::add_both, (1, 2)).unwrap(), 3);

    let rc = Rc::new(Counter::default());
    invoke(&rc, Counter::bump, ()).unwrap();
    assert_eq!(rc.hits(), 1);

    let handle = OwningHandle::from(rc.clone());
    assert_eq!(invoke(&handle, Counter::hits, ()).unwrap(), 1);

    let closure = |c: &Counter, a: u32, b: u32, d: u32| c.add(a * b * d);
    invoke(&handle, closure, (2, 3, 4)).unwrap();
    assert_eq!(rc.hits(), 25);
}

#[test]
fn dispatch_through_unset_handle_surfaces_null()
{
    let before = thread_local_stats();
    let handle: OwningHandle<Counter> = OwningHandle::Unset;

    let err = invoke(&handle, Counter::bump, ()).unwrap_err();
    assert!(err.is_null_handle());
    assert_eq!(thread_local_stats().null_accesses, before.null_accesses + 1);
}

#[test]
fn weak_dispatch_runs_exactly_once()
{
    let rc = Rc::new(Counter::default());

    let weak = Rc::downgrade(&rc);
    assert!(invoke_weak(&weak, Counter::bump, ()));
    assert_eq!(rc.hits(), 1);

    let handle: WeakHandle<Counter> = weak.clone().into();
    assert!(invoke_weak(&handle, Counter::add, (5,)));
    assert_eq!(rc.hits(), 6);

    assert_eq!(invoke_weak_with(&handle, Counter::add_both, (1, 1)), Some(8));
}

#[test]
fn weak_dispatch_to_vanished_target_declines()
{
    let before = thread_local_stats();
    let ran = Cell::new(0);
    let note = |_: &Counter| ran.set(ran.get() + 1);

    let rc = Rc::new(Counter::default());
    let weak: rc::Weak<Counter> = Rc::downgrade(&rc);
    let handle: WeakHandle<Counter> = OwningHandle::from(rc.clone()).downgrade();
    std::mem::drop(rc);

    assert!(!invoke_weak(&weak, note, ()));
    assert!(!invoke_weak(&handle, note, ()));
    assert_eq!(invoke_weak_with(&handle, Counter::hits, ()), None);
    assert_eq!(ran.get(), 0);

    let unset: WeakHandle<Counter> = WeakHandle::Unset;
    assert!(!invoke_weak(&unset, note, ()));

    let after = thread_local_stats();
    assert_eq!(after.declined_invocations, before.declined_invocations + 4);
    assert_eq!(after.null_accesses, before.null_accesses);
}

#[test]
fn dispatch_through_trait_objects()
{
    let drops = Rc::new(Cell::new(0));
    let handle: OwningHandle<dyn Greeter> = OwningHandle::new(robot(2, &drops)).upcast();
    assert_eq!(invoke(&handle, <dyn Greeter>::greet, ()).unwrap(), "hello from robot 2");

    let weak: WeakHandle<dyn Named> = handle.downgrade_to();
    assert_eq!(
        invoke_weak_with(&weak, <dyn Named>::name, ()).as_deref(),
        Some("robot 2")
    );
}

#[test]
fn errors_wrap_handle_failures()
{
    fn lookup(handle: &OwningHandle<Counter>) -> Result<u32, ChainedError>
    {
        let counter = handle.get().context("reading counter")?;
        Ok(counter.hits())
    }

    let err = lookup(&OwningHandle::Unset).unwrap_err();
    assert_eq!(
        err.to_string(),
        "reading counter handle should not contain null pointers"
    );
    assert!(!err.is_null_handle());
    assert!(err.parent().unwrap().is_null_handle());

    let outer = chained!(err; "step ", 2, " failed:");
    assert_eq!(outer.rendered_message(), "step 2 failed: reading counter");
    assert_eq!(
        outer.full_message(),
        "step 2 failed: reading counter handle should not contain null pointers"
    );
    assert!(err.has_parent());
}

#[test]
fn stress_test()
{
    let n = 500;
    let owners: Vec<OwningHandle<Counter>> =
        (0..n).map(|_| OwningHandle::new(Counter::default())).collect();
    let observers: Vec<WeakHandle<Counter>> = owners.iter().map(|o| o.downgrade()).collect();

    for observer in &observers {
        assert!(invoke_weak(observer, Counter::bump, ()));
    }
    assert!(owners.iter().all(|o| o.hits() == 1));

    std::mem::drop(owners);
    assert!(observers.iter().all(|o| !o.lock().is_set()));
}

#[cfg(feature = "global")]
mod global
{
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
    };

    use crate::*;

    #[test]
    fn handles_cross_threads()
    {
        let hits = OwningHandle::<_, Global>::allocate(AtomicUsize::new(0));
        let observer = hits.downgrade();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let hits = hits.clone();
                thread::spawn(move || {
                    hits.fetch_add(1, Ordering::Relaxed);
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(observer.lock().load(Ordering::Relaxed), 4);
        std::mem::drop(hits);
        assert!(!observer.is_alive());
    }

    #[test]
    fn weak_dispatch_across_threads()
    {
        let owner = Arc::new(AtomicUsize::new(0));
        let observer: WeakHandle<AtomicUsize, Global> = Arc::downgrade(&owner).into();

        let ran = thread::spawn(move || {
            invoke_weak(&observer, |hits: &AtomicUsize| {
                hits.fetch_add(1, Ordering::Relaxed);
            }, ())
        })
        .join()
        .unwrap();

        assert!(ran);
        assert_eq!(owner.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn global_stats_accumulate()
    {
        let before = global_stats();
        let handle: OwningHandle<AtomicUsize, Global> = OwningHandle::Unset;
        assert!(handle.get().is_err());
        assert!(global_stats().null_accesses > before.null_accesses);
        assert!(global_stats().total() > before.total());
    }
}
