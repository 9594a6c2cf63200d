use std::{cell::RefCell, rc::Rc};

use hooksack::{make_store, Runtime, Setter};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut rt = Runtime::new();
    let use_clicks = make_store(0);

    // a component that shows the clicks
    rt.mount({
        let use_clicks = use_clicks.clone();
        move |cx| {
            let (clicks, _) = use_clicks.use_full(cx);
            println!("clicks: {clicks}");
        }
    });

    // a component that only changes the clicks, so it renders once
    let button: Rc<RefCell<Option<Setter<i32>>>> = Rc::new(RefCell::new(None));
    rt.mount({
        let use_clicks = use_clicks.clone();
        let button = button.clone();
        move |cx| {
            *button.borrow_mut() = Some(use_clicks.use_setter(cx));
            println!("button rendered");
        }
    });

    let Some(set_clicks) = button.borrow().clone() else {
        return;
    };
    for _ in 0..3 {
        set_clicks.update(|clicks| clicks + 1);
        rt.update();
    }
}
