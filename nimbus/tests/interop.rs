// End-to-end interop scenarios across the kernel and the managed bridge,
// driven by the mock runtime. The managed language singleton is process
// wide, so every test takes the install lock and swaps in its own runtime.

use std::sync::{Arc, Mutex, MutexGuard};

use nimbus::prelude::*;
use nimbus_bridge::{binding_record, set_unhandled_exception_policy, MockClass, MockRuntime};

static INSTALL_LOCK: Mutex<()> = Mutex::new(());

fn setup() -> MutexGuard<'static, ()> {
    let guard = INSTALL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    register_core_classes();
    guard
}

fn core_hash() -> String {
    class_db().get_api_hash(ApiLevel::Core)
}

fn install(classes: Vec<MockClass>) -> Arc<MockRuntime> {
    let runtime = MockRuntime::new(&core_hash());
    for class in classes {
        runtime.add_class(class);
    }
    init_managed_language(runtime.clone());
    runtime
}

fn player_class() -> MockClass {
    MockClass::new("Game", "Player")
        .with_property(VariantKind::Int, "health")
        .with_method("take_damage")
        .with_method("OnAfterDeserialize")
}

// ---------------------------------------------------------------------------
// Signal core
// ---------------------------------------------------------------------------

#[test]
fn oneshot_connection_fires_once_then_detaches() {
    let _guard = setup();
    let a = Object::spawn_class("Object").unwrap();
    a.add_user_signal(MethodInfo::new("damaged").with_args(vec![PropertyInfo::new(
        VariantKind::Int,
        "amount",
    )]));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let m = Callable::from_fn("m", move |args| {
        sink.lock().unwrap().push(args[0].clone());
        Ok(Variant::Nil)
    });

    a.connect(StringName::new("damaged"), m.clone(), CONNECT_ONESHOT)
        .unwrap();
    a.emit_signal(StringName::new("damaged"), &[Variant::Int(7)]);
    a.emit_signal(StringName::new("damaged"), &[Variant::Int(8)]);

    assert_eq!(*seen.lock().unwrap(), vec![Variant::Int(7)]);
    assert!(!a.is_connected(StringName::new("damaged"), &m));
    a.free();
}

#[test]
fn disconnect_during_emit_skips_the_removed_slot() {
    let _guard = setup();
    let a = Object::spawn_class("Object").unwrap();
    a.add_user_signal(MethodInfo::new("tick"));

    let n = Callable::from_fn("n", |_| {
        panic!("slot removed mid-emit must not fire");
    });
    let n_for_b = n.clone();
    let source = a.clone();
    let b_calls = Arc::new(Mutex::new(0u32));
    let b_count = b_calls.clone();
    let m = Callable::from_fn("m", move |_| {
        *b_count.lock().unwrap() += 1;
        let _ = source.disconnect(StringName::new("tick"), &n_for_b);
        Ok(Variant::Nil)
    });

    a.connect(StringName::new("tick"), m.clone(), 0).unwrap();
    a.connect(StringName::new("tick"), n.clone(), 0).unwrap();
    a.emit_signal(StringName::new("tick"), &[]);

    assert_eq!(*b_calls.lock().unwrap(), 1);
    assert!(a.is_connected(StringName::new("tick"), &m));
    assert!(!a.is_connected(StringName::new("tick"), &n));
    a.free();
}

// ---------------------------------------------------------------------------
// Managed bindings
// ---------------------------------------------------------------------------

#[test]
fn binding_strength_follows_the_refcount_boundary() {
    let _guard = setup();
    let runtime = install(vec![MockClass::new("Nimbus", "RefCounted")]);

    let obj = Object::spawn_class("RefCounted").unwrap();
    assert!(obj.init_ref());
    assert_eq!(obj.ref_get_count(), 1);

    // First observation from managed code: peer created, then demoted
    // because only the managed side holds the object.
    let lang = managed_language().unwrap();
    obj.get_instance_binding(lang.slot()).unwrap();
    let record = binding_record(&obj).unwrap();
    let handle = record.gc_handle();
    assert!(!record.is_strong());
    assert!(!runtime.peer_is_strong(handle));

    obj.reference();
    assert_eq!(obj.ref_get_count(), 2);
    assert!(record.is_strong());
    assert!(runtime.peer_is_strong(handle));

    assert!(!obj.unreference());
    assert_eq!(obj.ref_get_count(), 1);
    assert!(!record.is_strong());

    // GC collects the weak peer; the final unreference may now destroy.
    runtime.collect_garbage();
    assert!(obj.unreference());
    obj.free();
}

#[test]
fn managed_exception_follows_the_log_policy() {
    let _guard = setup();
    set_unhandled_exception_policy(UnhandledExceptionPolicy::LogError);
    let runtime = install(vec![player_class().with_method("explode")]);
    runtime.set_throws("explode");

    let obj = Object::spawn_class("Object").unwrap();
    let script = ManagedScript::new(ManagedClassName::new("Game", "Player"), "res://Player.cs");
    obj.set_script(Some(script));

    // The exception is logged and the call yields Nil instead of crashing.
    let result = obj.call(StringName::new("explode"), &[]);
    assert_eq!(result, Ok(Variant::Nil));
    obj.free();
}

#[test]
fn deferred_call_to_a_freed_object_is_dropped() {
    let _guard = setup();
    let obj = Object::spawn_class("Object").unwrap();
    obj.call_deferred(StringName::new("to_string"), vec![]);
    obj.free();
    // Flushing after destruction drops the message without error.
    message_queue().flush();
}

// ---------------------------------------------------------------------------
// Hot reload
// ---------------------------------------------------------------------------

#[test]
fn reload_preserves_state_and_restores_delegates() {
    let _guard = setup();
    let old_runtime = install(vec![player_class()]);

    let obj = Object::spawn_class("Object").unwrap();
    let script = ManagedScript::new(ManagedClassName::new("Game", "Player"), "res://Player.cs");
    obj.set_script(Some(script.clone()));
    assert!(obj.set(StringName::new("health"), &Variant::Int(42)));

    let source = Object::spawn_class("Object").unwrap();
    source.add_user_signal(MethodInfo::new("died"));
    let delegate = old_runtime.register_delegate("OnDied", true);
    connect_event_signal(
        &source,
        StringName::new("died"),
        obj.entity_id(),
        StringName::new("OnDied"),
        delegate,
        0,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let assembly = dir.path().join("Project.dll");
    std::fs::write(&assembly, b"v1").unwrap();
    let coordinator = ReloadCoordinator::new(&assembly);

    let new_runtime = MockRuntime::new(&core_hash());
    new_runtime.add_class(player_class());
    let fresh = new_runtime.clone();
    coordinator
        .reload(&move || Ok(fresh.clone() as Arc<dyn ManagedRuntime>))
        .unwrap();

    assert!(old_runtime.is_unloaded());
    assert_eq!(obj.get(StringName::new("health")), Some(Variant::Int(42)));
    assert_eq!(
        obj.get_script().map(|s| s.class_name()),
        Some(StringName::new("Player"))
    );
    assert!(new_runtime
        .invocations()
        .iter()
        .any(|(_, method, _)| *method == StringName::new("OnAfterDeserialize")));

    // The delegate chain came back in the new domain.
    source.emit_signal(StringName::new("died"), &[]);
    assert_eq!(new_runtime.delegate_calls_for_event("OnDied").len(), 1);
    assert!(old_runtime.delegate_calls_for_event("OnDied").is_empty());

    obj.free();
    source.free();
}

#[test]
fn api_hash_mismatch_leaves_placeholders_attached() {
    let _guard = setup();
    install(vec![player_class()]);

    let obj = Object::spawn_class("Object").unwrap();
    let script = ManagedScript::new(ManagedClassName::new("Game", "Player"), "res://Player.cs");
    obj.set_script(Some(script));
    assert!(obj.set(StringName::new("health"), &Variant::Int(7)));

    let dir = tempfile::tempdir().unwrap();
    let assembly = dir.path().join("Project.dll");
    std::fs::write(&assembly, b"v2").unwrap();
    let coordinator = ReloadCoordinator::new(&assembly);

    let err = coordinator
        .reload(&|| Ok(MockRuntime::new("deadbeef") as Arc<dyn ManagedRuntime>))
        .unwrap_err();
    assert!(matches!(err, ReloadError::ApiHashMismatch { .. }));

    // The project stays loadable: script attached, instance parked on a
    // recording placeholder holding the snapshot values.
    assert!(obj.get_script().is_some());
    let instance = obj.script_instance().unwrap();
    assert!(instance.is_placeholder());
    assert_eq!(instance.get(StringName::new("health")), Some(Variant::Int(7)));
    assert!(nimbus_bridge::placeholder_owners().contains(&obj.entity_id()));

    obj.free();
}
