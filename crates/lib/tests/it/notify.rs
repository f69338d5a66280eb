//! Change observation: which events fire, and what the patches contain.

use std::sync::{Arc, Mutex};

use sediment::{ChangeObserver, Registry, Value, map};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Added(String),
    Changed(String, Value),
    Removed(String),
    Cleared,
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl ChangeObserver for Recorder {
    fn on_added(&self, id: &str) {
        self.events.lock().unwrap().push(Event::Added(id.to_string()));
    }

    fn on_changed(&self, id: &str, patch: &Value) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Changed(id.to_string(), patch.clone()));
    }

    fn on_removed(&self, id: &str) {
        self.events.lock().unwrap().push(Event::Removed(id.to_string()));
    }

    fn on_cleared(&self) {
        self.events.lock().unwrap().push(Event::Cleared);
    }
}

fn observed_registry() -> (Registry, Arc<Recorder>) {
    let registry = Registry::new();
    let recorder = Arc::new(Recorder::default());
    registry.set_observer(Some(recorder.clone() as Arc<dyn ChangeObserver>));
    (registry, recorder)
}

#[test]
fn add_fires_added_event() {
    let (registry, recorder) = observed_registry();
    registry
        .add_config(map! { "_id_" => "cfg", "_merge_" => map! { "x" => 1 } }, false, None)
        .unwrap();
    assert_eq!(recorder.take(), [Event::Added("cfg".to_string())]);
}

#[test]
fn merge_in_reports_patch_for_read_views() {
    let (registry, recorder) = observed_registry();
    registry
        .add_config(map! { "_id_" => "base", "_merge_" => map! { "x" => 1 } }, false, None)
        .unwrap();
    registry
        .add_config(
            map! { "_id_" => "child", "_parent_" => "base", "_merge_" => map! { "y" => 2 } },
            false,
            None,
        )
        .unwrap();

    // Reading the child populates its cache (and its ancestor's).
    registry.get_config("child", false, true).unwrap();
    recorder.take();

    registry
        .add_config(map! { "_id_" => "base", "_merge_" => map! { "x" => 5 } }, false, None)
        .unwrap();
    assert_eq!(
        recorder.take(),
        [
            Event::Added("base".to_string()),
            Event::Changed("base".to_string(), map! { "x" => 5 }),
            Event::Changed("child".to_string(), map! { "x" => 5 }),
        ]
    );
}

#[test]
fn unread_views_are_not_reported() {
    let (registry, recorder) = observed_registry();
    registry
        .add_config(map! { "_id_" => "base", "_merge_" => map! { "x" => 1 } }, false, None)
        .unwrap();
    registry
        .add_config(
            map! { "_id_" => "quiet", "_parent_" => "base", "_merge_" => map! { "y" => 2 } },
            false,
            None,
        )
        .unwrap();
    recorder.take();

    // Nobody has read any merged view, so a change reports nothing.
    registry
        .add_config(map! { "_id_" => "base", "_merge_" => map! { "x" => 5 } }, false, None)
        .unwrap();
    assert_eq!(recorder.take(), [Event::Added("base".to_string())]);
}

#[test]
fn equal_re_add_reports_no_change() {
    let (registry, recorder) = observed_registry();
    registry
        .add_config(map! { "_id_" => "cfg", "_merge_" => map! { "x" => 1 } }, false, None)
        .unwrap();
    registry.get_config("cfg", false, true).unwrap();
    recorder.take();

    registry
        .add_config(map! { "_id_" => "cfg", "_merge_" => map! { "x" => 1 } }, false, None)
        .unwrap();
    assert_eq!(recorder.take(), [Event::Added("cfg".to_string())]);
}

#[test]
fn set_config_reports_minimal_patch() {
    let (registry, recorder) = observed_registry();
    registry
        .add_config(
            map! { "_id_" => "cfg", "_merge_" => map! { "x" => 1, "old" => true } },
            false,
            None,
        )
        .unwrap();
    registry.get_config("cfg", false, true).unwrap();
    recorder.take();

    registry
        .set_config(map! { "_id_" => "cfg", "_merge_" => map! { "x" => 2 } })
        .unwrap();
    // The patch holds additions and changes only; the dropped key is not
    // represented.
    assert_eq!(
        recorder.take(),
        [Event::Changed("cfg".to_string(), map! { "x" => 2 })]
    );
}

#[test]
fn member_removal_patches_the_group_view() {
    let (registry, recorder) = observed_registry();
    registry
        .add_config(
            map! { "_id_" => "m1", "_group_" => "g", "_merge_" => map! { "a" => 1 } },
            false,
            None,
        )
        .unwrap();
    registry
        .add_config(
            map! { "_id_" => "m2", "_group_" => "g", "_merge_" => map! { "a" => 2, "b" => 3 } },
            false,
            None,
        )
        .unwrap();
    registry.get_config("g", false, true).unwrap();
    recorder.take();

    registry.remove_config("m2").unwrap();
    assert_eq!(
        recorder.take(),
        [
            Event::Removed("m2".to_string()),
            Event::Changed("g".to_string(), map! { "a" => 1 }),
        ]
    );
}

#[test]
fn clear_fires_cleared_event() {
    let (registry, recorder) = observed_registry();
    registry
        .add_config(map! { "_id_" => "cfg" }, false, None)
        .unwrap();
    recorder.take();

    registry.clear();
    assert_eq!(recorder.take(), [Event::Cleared]);
}

#[test]
fn unregistered_observer_receives_nothing() {
    let (registry, recorder) = observed_registry();
    registry.set_observer(None);
    registry
        .add_config(map! { "_id_" => "cfg" }, false, None)
        .unwrap();
    registry.clear();
    assert!(recorder.take().is_empty());
}

#[test]
fn observer_may_call_back_into_the_registry() {
    struct Reader {
        seen: Mutex<Vec<Value>>,
        registry: Arc<Registry>,
    }

    impl ChangeObserver for Reader {
        fn on_changed(&self, id: &str, _patch: &Value) {
            // The lock is released before callbacks run, so re-entrant
            // reads must not deadlock.
            let view = self.registry.get_config(id, false, true).unwrap();
            self.seen.lock().unwrap().push(view);
        }
    }

    let registry = Arc::new(Registry::new());
    let reader = Arc::new(Reader {
        seen: Mutex::new(Vec::new()),
        registry: registry.clone(),
    });
    registry.set_observer(Some(reader.clone() as Arc<dyn ChangeObserver>));

    registry
        .add_config(map! { "_id_" => "cfg", "_merge_" => map! { "x" => 1 } }, false, None)
        .unwrap();
    registry.get_config("cfg", false, true).unwrap();
    registry
        .add_config(map! { "_id_" => "cfg", "_merge_" => map! { "x" => 2 } }, false, None)
        .unwrap();

    assert_eq!(*reader.seen.lock().unwrap(), vec![map! { "x" => 2 }]);
}
