use std::cell::Cell;
use std::rc::Rc;

use scriptbind::prelude::*;
use scriptbind::{NativeFn, Reflection, Signature};

#[derive(Debug, Clone, Default, PartialEq)]
struct Vec2 {
    x: i32,
    y: i32,
}

impl NativeClass for Vec2 {
    const NAME: &'static str = "Vec2";
    const CAPABILITIES: Capabilities = Capabilities::BUFFERABLE;

    fn construct_default() -> Option<Self> {
        Some(Vec2::default())
    }

    fn copy_value(&self) -> Option<Self> {
        Some(self.clone())
    }
}

struct Mutex {
    locked: bool,
}

impl NativeClass for Mutex {
    const NAME: &'static str = "Mutex";
    const CAPABILITIES: Capabilities = Capabilities::DESTRUCT;
}

struct Sprite {
    name: String,
    position: Obj<Vec2>,
}

impl NativeClass for Sprite {
    const NAME: &'static str = "Sprite";
}

fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
    let calls = Rc::new(Cell::new(0));
    (Rc::clone(&calls), calls)
}

fn function(class: &ClassDefinition, name: &str) -> NativeFn {
    class.function(name).unwrap().thunk.clone()
}

#[test]
fn test_no_candidate_with_matching_arity() {
    let (calls, seen) = counter();
    let (a, b) = (Rc::clone(&calls), Rc::clone(&calls));
    let class = ClassBuilder::<Vec2>::new()
        .function("f", move |_: i32| a.set(a.get() + 1))
        .function("f", move |_: i32, _: i32| b.set(b.get() + 1))
        .build();

    let mut rt = ScriptRuntime::new();
    let f = function(&class, "f");
    let mut args = vec![ScriptValue::Int(1), ScriptValue::Int(2), ScriptValue::Int(3)];
    let err = rt.call(&f, &mut args).unwrap_err();

    assert!(matches!(err.source, NativeError::OverloadMismatch));
    assert_eq!(err.message, "invalid parameter!");
    assert_eq!(seen.get(), 0);
}

#[test]
fn test_plain_value_round_trip() {
    let class = ClassBuilder::<Vec2>::new()
        .function("id_int", |v: i32| v)
        .function("id_long", |v: i64| v)
        .function("id_double", |v: f64| v)
        .function("id_string", |v: String| v)
        .function("id_bool", |v: bool| v)
        .build();
    let mut rt = ScriptRuntime::new();

    let cases = [
        ("id_int", ScriptValue::Int(i32::MIN as i64)),
        ("id_int", ScriptValue::Int(i32::MAX as i64)),
        ("id_long", ScriptValue::Int(i64::MIN)),
        ("id_double", ScriptValue::Float(-0.25)),
        ("id_string", ScriptValue::String("héllo".into())),
        ("id_bool", ScriptValue::Bool(true)),
    ];
    for (name, value) in cases {
        let f = function(&class, name);
        let ret = rt.call(&f, &mut [value.clone()]).unwrap();
        assert_eq!(ret, value, "{name}");
    }
}

#[test]
fn test_mutable_value_reference_writes_back() {
    let class = ClassBuilder::<Vec2>::new()
        .function("double", |n: Mut<i32>| {
            if let Some(mut n) = n.get_mut() {
                *n *= 2;
            }
        })
        .function("init", |n: Mut<i32>| {
            n.set(7);
        })
        .build();
    let mut rt = ScriptRuntime::new();

    let mut args = [ScriptValue::Int(21)];
    rt.call(&function(&class, "double"), &mut args).unwrap();
    assert_eq!(args[0], ScriptValue::Int(42));

    // no native storage behind the argument before the call
    let mut args = [ScriptValue::Undefined];
    rt.call(&function(&class, "init"), &mut args).unwrap();
    assert_eq!(args[0], ScriptValue::Int(7));
}

#[test]
fn test_null_non_bufferable_reference_passes_through() {
    let (calls, seen) = counter();
    let class = ClassBuilder::<Mutex>::new()
        .function("try_lock", move |m: Mut<Mutex>| {
            calls.set(calls.get() + 1);
            match m.get_mut() {
                Some(mut m) => {
                    m.locked = true;
                    true
                }
                None => false,
            }
        })
        .build();
    let mut rt = ScriptRuntime::new();

    let mut args = [ScriptValue::Null];
    let ret = rt.call(&function(&class, "try_lock"), &mut args).unwrap();
    assert_eq!(ret, ScriptValue::Bool(false));
    assert_eq!(args[0], ScriptValue::Null);
    assert_eq!(seen.get(), 1);

    let handle = rt.heap_mut().allocate(Mutex::type_hash(), Mutex { locked: false });
    let mut args = [ScriptValue::Object(handle)];
    let ret = rt.call(&function(&class, "try_lock"), &mut args).unwrap();
    assert_eq!(ret, ScriptValue::Bool(true));
    assert!(rt.heap().resolve::<Mutex>(handle).unwrap().borrow().locked);
}

#[test]
fn test_null_bufferable_reference_gets_new_object() {
    let class = ClassBuilder::<Vec2>::new()
        .function("fill", |v: Mut<Vec2>| {
            v.set(Vec2 { x: 3, y: 4 });
        })
        .build();
    let mut rt = ScriptRuntime::new();

    let mut args = [ScriptValue::Null];
    rt.call(&function(&class, "fill"), &mut args).unwrap();

    let handle = args[0].as_object().unwrap();
    assert_eq!(*rt.heap().resolve::<Vec2>(handle).unwrap().borrow(), Vec2 { x: 3, y: 4 });
}

#[test]
fn test_overload_resolution_order() {
    let log = Rc::new(std::cell::RefCell::new(Vec::new()));
    let (one, two) = (Rc::clone(&log), Rc::clone(&log));
    let class = ClassBuilder::<Vec2>::new()
        .function("f", move |a: i32| one.borrow_mut().push(vec![a]))
        .function("f", move |a: i32, b: i32| two.borrow_mut().push(vec![a, b]))
        .build();
    let mut rt = ScriptRuntime::new();
    let f = function(&class, "f");

    rt.call(&f, &mut [ScriptValue::Int(1)]).unwrap();
    rt.call(&f, &mut [ScriptValue::Int(1), ScriptValue::Int(2)]).unwrap();
    let err = rt.call(&f, &mut []).unwrap_err();

    assert!(matches!(err.source, NativeError::OverloadMismatch));
    assert_eq!(*log.borrow(), vec![vec![1], vec![1, 2]]);
}

#[test]
fn test_property_on_destroyed_instance() {
    let class = ClassBuilder::<Sprite>::new()
        .constructor(|name: String| Sprite {
            name,
            position: Obj::new(Vec2::default()),
        })
        .property("name", member!(Sprite, name))
        .object_property("position", member!(Sprite, position))
        .build();
    let mut rt = ScriptRuntime::new();

    let sprite = rt
        .call(class.constructor.as_ref().unwrap(), &mut [ScriptValue::String("hero".into())])
        .unwrap();
    let getter = class.property("name").unwrap().getter.clone();
    assert_eq!(
        rt.call_method(&getter, sprite.clone(), &mut []).unwrap(),
        ScriptValue::String("hero".into())
    );

    class.finalizer.run(rt.heap_mut(), sprite.as_object().unwrap());

    let err = rt.call_method(&getter, sprite.clone(), &mut []).unwrap_err();
    assert!(matches!(err.source, NativeError::NullReceiver));
    assert_eq!(err.message, "access a null object");

    let setter = class.property("name").unwrap().setter.clone().unwrap();
    let err = rt
        .call_method(&setter, sprite, &mut [ScriptValue::String("ghost".into())])
        .unwrap_err();
    assert!(matches!(err.source, NativeError::NullReceiver));
}

#[test]
fn test_constructor_mismatch_allocates_nothing() {
    let (calls, seen) = counter();
    let (a, b) = (Rc::clone(&calls), Rc::clone(&calls));
    let class = ClassBuilder::<Vec2>::new()
        .constructor(move || {
            a.set(a.get() + 1);
            Vec2::default()
        })
        .constructor(move |x: i32| {
            b.set(b.get() + 1);
            Vec2 { x, y: x }
        })
        .build();
    let mut rt = ScriptRuntime::new();

    let err = rt
        .call(class.constructor.as_ref().unwrap(), &mut [ScriptValue::String("nope".into())])
        .unwrap_err();

    assert!(matches!(err.source, NativeError::OverloadMismatch));
    assert_eq!(rt.heap().live_count(), 0);
    assert_eq!(seen.get(), 0);
}

#[test]
fn test_object_member_liveness_link() {
    let mut registry = ClassRegistry::new();
    ClassBuilder::<Vec2>::new().register(&mut registry).unwrap();
    ClassBuilder::<Sprite>::new()
        .constructor(|name: String| Sprite {
            name,
            position: Obj::new(Vec2 { x: 1, y: 2 }),
        })
        .object_property("position", member!(Sprite, position))
        .register(&mut registry)
        .unwrap();

    let mut rt = ScriptRuntime::new();
    let sprite = registry
        .construct(rt.heap_mut(), Sprite::type_hash(), &mut [ScriptValue::String("s".into())])
        .unwrap();
    let class = registry.get(Sprite::type_hash()).unwrap();
    let get = class.property("position").unwrap().getter.clone();

    let position = rt.call_method(&get, ScriptValue::Object(sprite), &mut []).unwrap();
    let position = position.as_object().unwrap();
    assert_eq!(rt.heap().owner_of(position), Some(sprite));

    // the owner survives its own release while the sub-object is alive
    rt.heap_mut().release(sprite);
    assert!(rt.heap().is_live(sprite));
    rt.heap_mut().release(position);
    assert!(!rt.heap().is_live(position));
    assert!(!rt.heap().is_live(sprite));
}

#[test]
fn test_pointer_return_mode_keeps_identity() {
    let shared = Obj::new(Vec2 { x: 5, y: 5 });
    let (by_value, by_pointer) = (shared.clone(), shared.clone());
    let class = ClassBuilder::<Vec2>::new()
        .function("copy", move || by_value.clone())
        .function_with(
            "origin",
            CallOptions::default().with_return_mode(ReturnMode::Pointer),
            move || by_pointer.clone(),
        )
        .build();
    let mut rt = ScriptRuntime::new();

    let a = rt.call(&function(&class, "origin"), &mut []).unwrap();
    let b = rt.call(&function(&class, "origin"), &mut []).unwrap();
    let c = rt.call(&function(&class, "copy"), &mut []).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);

    shared.borrow_mut().x = 9;
    let seen = rt.heap().resolve::<Vec2>(a.as_object().unwrap()).unwrap();
    assert_eq!(seen.borrow().x, 9);
    let copied = rt.heap().resolve::<Vec2>(c.as_object().unwrap()).unwrap();
    assert_eq!(copied.borrow().x, 5);
}

#[test]
fn test_checked_single_function() {
    let class = ClassBuilder::<Vec2>::new()
        .function_with("strict", CallOptions::checked(), |x: i32| x)
        .function("loose", |x: i32| x)
        .build();
    let mut rt = ScriptRuntime::new();

    let err = rt
        .call(&function(&class, "strict"), &mut [ScriptValue::Bool(true)])
        .unwrap_err();
    assert!(matches!(err.source, NativeError::OverloadMismatch));

    let err = rt
        .call(&function(&class, "loose"), &mut [ScriptValue::Bool(true)])
        .unwrap_err();
    assert!(matches!(err.source, NativeError::Conversion(_)));

    let err = rt.call(&function(&class, "loose"), &mut []).unwrap_err();
    assert_eq!(err.source.to_string(), "expected 1 arguments, got 0");
}

#[test]
fn test_pointer_parameter_value_in_value_out() {
    let class = ClassBuilder::<Vec2>::new()
        .function("shift", |v: Ptr<Vec2>| v.borrow_mut().x += 10)
        .build();
    let mut rt = ScriptRuntime::new();
    let original = rt.heap_mut().allocate(Vec2::type_hash(), Vec2 { x: 1, y: 0 });

    let mut args = [ScriptValue::Object(original)];
    rt.call(&function(&class, "shift"), &mut args).unwrap();

    let written = args[0].as_object().unwrap();
    assert_ne!(written, original);
    assert_eq!(rt.heap().resolve::<Vec2>(original).unwrap().borrow().x, 1);
    assert_eq!(rt.heap().resolve::<Vec2>(written).unwrap().borrow().x, 11);
}

#[test]
fn test_methods_and_receivers() {
    let class = ClassBuilder::<Vec2>::new()
        .constructor(|x: i32, y: i32| Vec2 { x, y })
        .method("len2", |v: &Vec2| v.x * v.x + v.y * v.y)
        .method_mut("scale", |v: &mut Vec2, k: i32| {
            v.x *= k;
            v.y *= k;
        })
        .method("dot", |v: &Vec2, other: Ref<Vec2>| {
            other.get().map(|o| v.x * o.x + v.y * o.y).unwrap_or(0)
        })
        .build();
    let mut rt = ScriptRuntime::new();
    let ctor = class.constructor.clone().unwrap();

    let v = rt.call(&ctor, &mut [ScriptValue::Int(3), ScriptValue::Int(4)]).unwrap();
    let len2 = class.method("len2").unwrap().thunk.clone();
    let scale = class.method("scale").unwrap().thunk.clone();
    let dot = class.method("dot").unwrap().thunk.clone();

    assert_eq!(rt.call_method(&len2, v.clone(), &mut []).unwrap(), ScriptValue::Int(25));
    rt.call_method(&scale, v.clone(), &mut [ScriptValue::Int(2)]).unwrap();
    assert_eq!(rt.call_method(&len2, v.clone(), &mut []).unwrap(), ScriptValue::Int(100));

    // read-only self-alias is allowed
    assert_eq!(rt.call_method(&dot, v.clone(), &mut [v.clone()]).unwrap(), ScriptValue::Int(100));
    assert_eq!(rt.call_method(&dot, v, &mut [ScriptValue::Null]).unwrap(), ScriptValue::Int(0));

    let err = rt.call_method(&len2, ScriptValue::Int(1), &mut []).unwrap_err();
    assert!(matches!(err.source, NativeError::InvalidThis { .. }));
}

#[test]
fn test_reflection_is_sentinel_terminated() {
    let class = ClassBuilder::<Vec2>::new()
        .constructor(|| Vec2::default())
        .method("len2", |v: &Vec2| v.x * v.x + v.y * v.y)
        .function("zero", || Vec2::default())
        .property("x", member!(Vec2, x))
        .variable("instances", Obj::new(0u32))
        .build();
    let Reflection {
        constructors,
        methods,
        functions,
        properties,
        variables,
    } = &class.reflection;

    for array in [constructors, methods, functions, properties, variables] {
        assert_eq!(array.as_raw().last(), Some(&None));
        assert_eq!(array.len(), 1);
    }
    assert_eq!(methods.iter().next().unwrap().signature, Signature::new(vec![], "int"));
    assert_eq!(functions.iter().next().unwrap().signature.to_string(), "Vec2()");
    assert_eq!(class.functions.as_raw().last().map(Option::is_none), Some(true));
}
