//! Counter application wiring a store, a selector and a connected component

use std::cell::RefCell;
use std::rc::Rc;
use tinstate::{connect, create_selector, Connectable, ReactiveRuntime, Store};

#[derive(Clone, Debug)]
struct CounterState {
    count: i32,
    step: i32,
    history: Vec<i32>,
}

impl CounterState {
    fn new() -> Self {
        Self {
            count: 0,
            step: 1,
            history: vec![0],
        }
    }

    fn increment(&self) -> Self {
        let count = self.count + self.step;
        let mut history = self.history.clone();
        history.push(count);
        Self {
            count,
            history,
            ..self.clone()
        }
    }

    fn with_step(&self, step: i32) -> Self {
        Self {
            step,
            ..self.clone()
        }
    }
}

/// Stand-in for a rendered UI element.
struct CounterView {
    rendered: String,
}

impl Connectable<CounterState> for CounterView {
    fn on_connect(&mut self) {
        println!("   [View] connected");
    }

    fn on_disconnect(&mut self) {
        println!("   [View] disconnected");
    }

    fn state_changed(&mut self, state: &CounterState) {
        self.rendered = format!("Count: {} (step {})", state.count, state.step);
        println!("   [View] {}", self.rendered);
    }
}

fn main() {
    println!("=== Complete Counter Application ===\n");

    let runtime = ReactiveRuntime::current();

    println!("1. Initializing counter store");
    let store = Store::new(CounterState::new());

    println!("\n2. Connecting the view");
    let view = Rc::new(RefCell::new(CounterView {
        rendered: String::new(),
    }));
    let mut connected = connect(&store, view.clone());
    connected.connect().expect("fresh view connects");

    println!("\n3. Three increments in one turn");
    store.apply(CounterState::increment);
    store.apply(CounterState::increment);
    store.apply(CounterState::increment);
    println!("   Store already holds: {}", store.get().count);
    let ran = runtime.flush().expect("subscribers do not panic");
    println!("   Broadcasts delivered: {ran}");

    println!("\n4. Derived average of the history");
    let average = create_selector((|s: &CounterState| s.history.clone(),), |(history,): &(Vec<i32>,)| {
        println!("   (computing average)");
        history.iter().sum::<i32>() as f64 / history.len() as f64
    });
    println!("   Average: {:.2}", average.select(&store.get()));
    println!("   Average: {:.2}", average.select(&store.get()));

    println!("\n5. Changing step and waiting for the broadcast");
    store
        .apply(|s| s.with_step(5).increment())
        .wait()
        .expect("broadcast completes");
    println!("   Average: {:.2}", average.select(&store.get()));

    println!("\n6. Disconnecting");
    connected.disconnect().expect("view is connected");
    store.apply(CounterState::increment);
    runtime.flush().expect("no subscribers left");
    println!("   Final state: {:?}", store.get());
    println!("   Last render: {}", view.borrow().rendered);
}
