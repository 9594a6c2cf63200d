use std::{
    cell::{Cell, RefCell},
    panic::{catch_unwind, AssertUnwindSafe},
};

use assert_call::{call, CallRecorder};

use super::*;

#[test]
fn new() {
    let s = Store::new(10);
    assert_eq!(*s.state(), 10);
    assert_eq!(s.mode(), StoreMode::Direct);
    assert_eq!(s.subscriber_count(), 0);
}

#[test]
fn state_is_same_rc_until_changed() {
    let s = Store::new(String::from("a"));
    let a0 = s.state();
    let a1 = s.state();
    assert!(Rc::ptr_eq(&a0, &a1));

    s.setter().set("b".into());
    assert!(!Rc::ptr_eq(&a0, &s.state()));
}

#[test]
fn direct_mode_value_and_update() {
    let s = Store::new(0);
    s.dispatch(SetState::value(1));
    assert_eq!(*s.state(), 1);

    s.dispatch(SetState::update(|x| x + 1));
    assert_eq!(*s.state(), 2);
}

#[test]
fn reducer_mode() {
    let s = Store::with_reducer(0, |s: &i32, a: &'static str| {
        if a == "inc" {
            s + 1
        } else {
            s - 1
        }
    });
    assert_eq!(s.mode(), StoreMode::Reducer);

    s.dispatch("inc");
    assert_eq!(*s.state(), 1);

    s.dispatch("dec");
    assert_eq!(*s.state(), 0);
}

#[test]
fn reducer_action_is_never_invoked() {
    let invoked = Rc::new(Cell::new(false));
    let s = Store::with_reducer(0, |s: &i32, _action: Box<dyn Fn()>| s + 1);
    let flag = invoked.clone();
    s.dispatch(Box::new(move || flag.set(true)));
    assert_eq!(*s.state(), 1);
    assert!(!invoked.get());
}

#[derive(Clone, Debug, PartialEq)]
struct Todo {
    name: String,
    done: bool,
}

enum TodoAction {
    Add(Todo),
    Del(Todo),
}

fn todo_reducer(state: &Vec<Todo>, action: TodoAction) -> Vec<Todo> {
    match action {
        TodoAction::Add(todo) => {
            let mut next = state.clone();
            next.push(todo);
            next
        }
        TodoAction::Del(todo) => state.iter().filter(|t| **t != todo).cloned().collect(),
    }
}

#[test]
fn reducer_with_payload() {
    let s: Store<Vec<Todo>, TodoAction> = Store::with_reducer(Vec::new(), todo_reducer);
    let todo1 = Todo {
        name: "first todo".into(),
        done: false,
    };
    let todo2 = Todo {
        name: "second todo".into(),
        done: true,
    };
    assert!(s.state().is_empty());

    s.dispatch(TodoAction::Add(todo1.clone()));
    assert_eq!(s.state().len(), 1);
    assert!(s.state().contains(&todo1));
    assert!(!s.state().contains(&todo2));

    s.dispatch(TodoAction::Add(todo2.clone()));
    assert_eq!(s.state().len(), 2);
    assert!(s.state().contains(&todo1));
    assert!(s.state().contains(&todo2));

    s.dispatch(TodoAction::Del(todo1.clone()));
    assert_eq!(s.state().len(), 1);
    assert!(s.state().contains(&todo2));
    assert!(!s.state().contains(&todo1));
}

#[test]
fn dispatch_notifies_subscribers() {
    let mut cr = CallRecorder::new();
    let s = Store::new(0);
    let cb = Callback::new(|v: &Rc<i32>| call!("{v}"));
    s.subscribe(&cb);

    s.setter().set(5);
    cr.verify("5");

    s.setter().update(|x| x * 2);
    cr.verify("10");
}

#[test]
fn same_rc_does_not_notify() {
    let mut cr = CallRecorder::new();
    let s = Store::new(0);
    let _w = s.watch(|v| call!("{v}"));

    s.setter().set_rc(s.state());
    cr.verify(());

    s.setter().update_rc(|current| current.clone());
    cr.verify(());
}

#[test]
fn rc_reducer_may_keep_state() {
    let mut cr = CallRecorder::new();
    let s = Store::with_rc_reducer(Rc::new(0), |s: &Rc<i32>, a: i32| {
        if a == 0 {
            s.clone()
        } else {
            Rc::new(**s + a)
        }
    });
    let _w = s.watch(|v| call!("{v}"));

    s.dispatch(0);
    cr.verify(());

    s.dispatch(3);
    cr.verify("3");
}

#[test]
fn equal_value_in_new_rc_notifies() {
    let mut cr = CallRecorder::new();
    let s = Store::new(0);
    let _w = s.watch(|v| call!("{v}"));

    s.setter().set(0);
    cr.verify("0");
}

#[test]
fn set_dedup() {
    let mut cr = CallRecorder::new();
    let s = Store::new(0);
    let _w = s.watch(|v| call!("{v}"));

    s.setter().set_dedup(0);
    cr.verify(());

    s.setter().set_dedup(1);
    cr.verify("1");
}

#[test]
fn subscribe_is_idempotent() {
    let mut cr = CallRecorder::new();
    let s = Store::new(0);
    let cb = Callback::new(|v: &Rc<i32>| call!("{v}"));
    s.subscribe(&cb);
    s.subscribe(&cb);
    assert_eq!(s.subscriber_count(), 1);

    s.setter().set(1);
    cr.verify("1");
}

#[test]
fn unsubscribe() {
    let mut cr = CallRecorder::new();
    let s = Store::new(0);
    let cb = Callback::new(|v: &Rc<i32>| call!("{v}"));
    s.subscribe(&cb);
    assert!(s.is_subscribed(&cb));

    s.unsubscribe(&cb);
    assert!(!s.is_subscribed(&cb));
    s.setter().set(1);
    cr.verify(());
}

#[test]
fn unsubscribe_absent_is_noop() {
    let s = Store::new(0);
    let a = Callback::new(|_: &Rc<i32>| {});
    let b = Callback::new(|_: &Rc<i32>| {});
    s.subscribe(&a);
    s.unsubscribe(&b);
    s.unsubscribe(&b);
    assert_eq!(s.subscriber_count(), 1);
}

#[test]
fn watch_unsubscribes_on_drop() {
    let mut cr = CallRecorder::new();
    let s = Store::new(0);
    let w = s.watch(|v| call!("{v}"));
    assert_eq!(s.subscriber_count(), 1);

    drop(w);
    assert_eq!(s.subscriber_count(), 0);
    s.setter().set(1);
    cr.verify(());
}

#[test]
fn watch_outlives_store() {
    let s = Store::new(0);
    let w = s.watch(|_| {});
    drop(s);
    drop(w);
}

#[test]
fn subscriber_removed_during_notify_is_still_called() {
    let calls = Rc::new(Cell::new(0));
    let s = Store::new(0);
    let late = Callback::new({
        let calls = calls.clone();
        move |_: &Rc<i32>| calls.set(calls.get() + 1)
    });
    let early = Callback::new({
        let s = s.clone();
        let late = late.clone();
        move |_: &Rc<i32>| s.unsubscribe(&late)
    });
    s.subscribe(&early);
    s.subscribe(&late);

    s.setter().set(1);
    assert_eq!(calls.get(), 1);
    assert_eq!(s.subscriber_count(), 1);

    s.setter().set(2);
    assert_eq!(calls.get(), 1);
}

#[test]
fn subscriber_added_during_notify_is_called_next_time() {
    let calls = Rc::new(Cell::new(0));
    let s = Store::new(0);
    let added = Callback::new({
        let calls = calls.clone();
        move |_: &Rc<i32>| calls.set(calls.get() + 1)
    });
    let adder = Callback::new({
        let s = s.clone();
        let added = added.clone();
        move |_: &Rc<i32>| s.subscribe(&added)
    });
    s.subscribe(&adder);

    s.setter().set(1);
    assert_eq!(calls.get(), 0);

    s.setter().set(2);
    assert_eq!(calls.get(), 1);
}

#[test]
fn dispatch_during_notify_delivers_latest_state() {
    let s = Store::new(0);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let bump = Callback::new({
        let s = s.clone();
        move |v: &Rc<i32>| {
            if **v == 1 {
                s.setter().set(2)
            }
        }
    });
    let record = Callback::new({
        let seen = seen.clone();
        move |v: &Rc<i32>| seen.borrow_mut().push(**v)
    });
    s.subscribe(&bump);
    s.subscribe(&record);

    s.setter().set(1);
    assert_eq!(*s.state(), 2);
    assert_eq!(seen.borrow().last(), Some(&2));
}

#[test]
fn reducer_panic_leaves_state_unchanged() {
    let mut cr = CallRecorder::new();
    let s = Store::with_reducer(1, |s: &i32, a: &'static str| match a {
        "inc" => s + 1,
        _ => panic!("unknown action `{a}`"),
    });
    let _w = s.watch(|v| call!("{v}"));

    let r = catch_unwind(AssertUnwindSafe(|| s.dispatch("increment")));
    assert!(r.is_err());
    assert_eq!(*s.state(), 1);
    cr.verify(());

    s.dispatch("inc");
    assert_eq!(*s.state(), 2);
    cr.verify("2");
}

#[test]
fn batch_wraps_each_notifying_dispatch() {
    let mut cr = CallRecorder::new();
    let s = Store::new(0).with_batch(Batch::new(|f| {
        call!("begin");
        f();
        call!("end");
    }));
    let _a = s.watch(|v| call!("a {v}"));

    s.setter().set(1);
    cr.verify(["begin", "a 1", "end"]);

    s.setter().set_rc(s.state());
    cr.verify(());
}

#[test]
fn batch_is_skipped_without_subscribers() {
    let mut cr = CallRecorder::new();
    let s = Store::new(0).with_batch(Batch::new(|f| {
        call!("batch");
        f();
    }));
    s.setter().set(1);
    cr.verify(());
}

#[test]
fn setters_are_equal() {
    let s = Store::new(0);
    let a = s.setter();
    a.set(1);
    let b = s.setter();
    assert_eq!(a, b);
    assert!(Store::ptr_eq(&a.store(), &s));

    let other = Store::new(0);
    assert_ne!(a, other.setter());
}

#[test]
fn serialize() {
    let s = Store::new(vec![1, 2, 3]);
    assert_eq!(serde_json::to_string(&s).unwrap(), "[1,2,3]");

    let s: Store<Vec<i32>> = serde_json::from_str("[4,5]").unwrap();
    assert_eq!(*s.state(), vec![4, 5]);
    assert_eq!(s.mode(), StoreMode::Direct);
}

#[test]
fn debug() {
    let s = Store::new(3);
    let _w = s.watch(|_| {});
    assert_eq!(
        format!("{s:?}"),
        "Store { state: 3, mode: Direct, subscribers: 1 }"
    );
    assert_eq!(StoreMode::Reducer.to_string(), "reducer");
}
