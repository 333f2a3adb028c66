//! End-to-end interception properties: chain ordering, replay, fail-fast,
//! short-circuiting, and output-parameter write-back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proxyweave::prelude::*;

/// Target with observable side effects.
struct Worker {
    calls: AtomicUsize,
}

fn worker_surface() -> Arc<OperationSurface> {
    let declaring = TypeKey::new("IWorker");
    OperationSurface::builder(declaring.clone())
        .operation(OperationDescriptor::bind::<Worker, _>(
            OperationSig::new(declaring.clone(), "bump", vec![]),
            |worker, _, _| Ok(ret(worker.calls.fetch_add(1, Ordering::SeqCst) + 1)),
        ))
        .operation(OperationDescriptor::bind::<Worker, _>(
            OperationSig::new(
                declaring.clone(),
                "do_it",
                vec![
                    ParamSpec::input("val"),
                    ParamSpec::inout("flag"),
                    ParamSpec::output("result"),
                ],
            ),
            |_, _, args| {
                let val = *args.expect::<i32>(0, "IWorker.do_it")?;
                let flag = *args.expect::<bool>(1, "IWorker.do_it")?;
                args.set(1, !flag);
                args.set(2, val * 2);
                Ok(unit())
            },
        ))
        .operation(OperationDescriptor::bind::<Worker, _>(
            OperationSig::generic(declaring, "echo_as", vec![ParamSpec::input("v")], 1),
            |_, generics, args| {
                let v = *args.expect::<i32>(0, "IWorker.echo_as")?;
                Ok(ret(format!("{}:{v}", generics[0])))
            },
        ))
        .build()
        .unwrap()
}

fn worker_proxy() -> (ProxyDispatcher, Arc<Worker>, ProxyConfig) {
    let worker = Arc::new(Worker {
        calls: AtomicUsize::new(0),
    });
    let mut config = ProxyConfig::new();
    config.set_target(TypeKey::new("Worker"), worker.clone());
    config.add_surface(worker_surface());
    let proxy = create_dispatcher(&config).unwrap();
    (proxy, worker, config)
}

/// Around advice that appends entry/exit markers to a shared trace.
struct Tracing {
    label: &'static str,
    trace: Arc<Mutex<Vec<String>>>,
}

impl Interceptor for Tracing {
    fn invoke(&self, ctx: &mut InvocationContext<'_>) -> Result<ReturnValue> {
        self.trace.lock().unwrap().push(format!("{}-in", self.label));
        let result = ctx.proceed();
        self.trace.lock().unwrap().push(format!("{}-out", self.label));
        result
    }
}

#[test]
fn zero_advisors_is_pure_pass_through() {
    let (proxy, worker, _config) = worker_proxy();
    let declaring = TypeKey::new("IWorker");

    let sig = OperationSig::new(declaring.clone(), "bump", vec![]);
    let mut args = ArgList::for_sig(&sig);
    let result = proxy.invoke(&declaring, "bump", &mut args).unwrap();
    assert_eq!(*result.downcast::<usize>().unwrap(), 1);
    assert_eq!(worker.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn out_params_match_a_direct_call() {
    // Proxied call through a no-op interceptor.
    let (proxy, _worker, config) = worker_proxy();
    config
        .add_advice(Advice::Around(Arc::new(FnInterceptor::new(|ctx| {
            ctx.proceed()
        }))))
        .unwrap();
    let declaring = TypeKey::new("IWorker");

    let sig = OperationSig::new(
        declaring.clone(),
        "do_it",
        vec![
            ParamSpec::input("val"),
            ParamSpec::inout("flag"),
            ParamSpec::output("result"),
        ],
    );
    let mut proxied = ArgList::for_sig(&sig);
    proxied.set(0, 21_i32);
    proxied.set(1, false);
    proxy.invoke(&declaring, "do_it", &mut proxied).unwrap();

    // Direct (unproxied) call against a fresh target.
    let (direct_proxy, _, _) = worker_proxy();
    let mut direct = ArgList::for_sig(&sig);
    direct.set(0, 21_i32);
    direct.set(1, false);
    direct_proxy.invoke(&declaring, "do_it", &mut direct).unwrap();

    assert_eq!(proxied.get::<bool>(1), direct.get::<bool>(1));
    assert_eq!(proxied.get::<i32>(2), direct.get::<i32>(2));
    assert_eq!(proxied.get::<bool>(1), Some(&true));
    assert_eq!(proxied.get::<i32>(2), Some(&42));
}

#[test]
fn interceptors_nest_in_registration_order() {
    let (proxy, worker, config) = worker_proxy();
    let trace = Arc::new(Mutex::new(Vec::new()));
    for label in ["one", "two", "three"] {
        config
            .add_advice(Advice::Around(Arc::new(Tracing {
                label,
                trace: trace.clone(),
            })))
            .unwrap();
    }

    let declaring = TypeKey::new("IWorker");
    let mut args = ArgList::empty();
    proxy.invoke(&declaring, "bump", &mut args).unwrap();

    assert_eq!(worker.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["one-in", "two-in", "three-in", "three-out", "two-out", "one-out"]
    );
}

#[test]
fn proceeding_twice_runs_the_target_twice() {
    let (proxy, worker, config) = worker_proxy();
    config
        .add_advice(Advice::Around(Arc::new(FnInterceptor::new(|ctx| {
            let _ = ctx.proceed()?;
            ctx.proceed()
        }))))
        .unwrap();

    let declaring = TypeKey::new("IWorker");
    let mut args = ArgList::empty();
    let result = proxy.invoke(&declaring, "bump", &mut args).unwrap();

    assert_eq!(worker.calls.load(Ordering::SeqCst), 2);
    assert_eq!(*result.downcast::<usize>().unwrap(), 2);
}

struct VetoBefore;

impl BeforeAdvice for VetoBefore {
    fn before(&self, _: &OperationSig, _: &mut ArgList) -> Result<()> {
        Err(Fault::with_payload("not allowed", "denied".to_string()).into())
    }
}

#[test]
fn failing_before_advice_is_fail_fast() {
    let (proxy, worker, config) = worker_proxy();
    let trace = Arc::new(Mutex::new(Vec::new()));
    config
        .add_advice(Advice::Before(Arc::new(VetoBefore)))
        .unwrap();
    config
        .add_advice(Advice::Around(Arc::new(Tracing {
            label: "inner",
            trace: trace.clone(),
        })))
        .unwrap();

    let declaring = TypeKey::new("IWorker");
    let mut args = ArgList::empty();
    let err = proxy.invoke(&declaring, "bump", &mut args).unwrap_err();

    // Nothing downstream ran, and the original fault arrived unmodified.
    assert_eq!(worker.calls.load(Ordering::SeqCst), 0);
    assert!(trace.lock().unwrap().is_empty());
    match err {
        Error::Fault(fault) => {
            assert_eq!(fault.message, "not allowed");
            assert_eq!(fault.payload_ref::<String>().map(String::as_str), Some("denied"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn freeze_blocks_and_unfreeze_permits_advisors() {
    let (_proxy, _worker, config) = worker_proxy();
    let advice = Advice::Around(Arc::new(FnInterceptor::new(|ctx| ctx.proceed())));

    config.freeze();
    assert!(matches!(
        config.add_advice(advice.clone()).unwrap_err(),
        Error::ConfigurationFrozen
    ));

    config.unfreeze();
    config.add_advice(advice).unwrap();
}

#[test]
fn advisor_mutation_applies_to_live_dispatcher() {
    let (proxy, worker, config) = worker_proxy();
    let declaring = TypeKey::new("IWorker");

    let mut args = ArgList::empty();
    proxy.invoke(&declaring, "bump", &mut args).unwrap();

    // Administrative change after traffic has started: the chain cache must
    // pick it up on the next call.
    config
        .add_advice(Advice::Around(Arc::new(FnInterceptor::new(|ctx| {
            let _ = ctx.proceed()?;
            ctx.proceed()
        }))))
        .unwrap();

    let mut args = ArgList::empty();
    proxy.invoke(&declaring, "bump", &mut args).unwrap();
    assert_eq!(worker.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn name_pointcut_limits_advice_to_matching_operations() {
    let (proxy, worker, config) = worker_proxy();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    config
        .add_advisor(Advisor::new(
            Arc::new(NameMatchPointcut::new().name("bump")),
            Advice::Around(Arc::new(FnInterceptor::new(move |ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                ctx.proceed()
            }))),
        ))
        .unwrap();

    let declaring = TypeKey::new("IWorker");
    let mut args = ArgList::empty();
    proxy.invoke(&declaring, "bump", &mut args).unwrap();

    let sig = OperationSig::new(
        declaring.clone(),
        "do_it",
        vec![
            ParamSpec::input("val"),
            ParamSpec::inout("flag"),
            ParamSpec::output("result"),
        ],
    );
    let mut args = ArgList::for_sig(&sig);
    args.set(0, 1_i32);
    args.set(1, true);
    proxy.invoke(&declaring, "do_it", &mut args).unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(worker.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn dynamic_vetoes_are_fixed_before_the_chain_runs() {
    let (proxy, _worker, config) = worker_proxy();

    // First interceptor rewrites `val` to a value the dynamic pointcut would
    // veto; the chain was selected against the original arguments, so the
    // dynamically matched advice still runs and the target sees the rewrite.
    config
        .add_advice(Advice::Around(Arc::new(FnInterceptor::new(|ctx| {
            ctx.args_mut().set(0, -1_i32);
            ctx.proceed()
        }))))
        .unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    config
        .add_advisor(Advisor::new(
            Arc::new(DynamicFnPointcut::new(
                |_: &OperationSig, _: &TypeKey| true,
                |_: &OperationSig, _: &TypeKey, args: &ArgList| {
                    args.get::<i32>(0).is_some_and(|v| *v > 0)
                },
            )),
            Advice::Around(Arc::new(FnInterceptor::new(move |ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                ctx.proceed()
            }))),
        ))
        .unwrap();

    let declaring = TypeKey::new("IWorker");
    let sig = OperationSig::new(
        declaring.clone(),
        "do_it",
        vec![
            ParamSpec::input("val"),
            ParamSpec::inout("flag"),
            ParamSpec::output("result"),
        ],
    );
    let mut args = ArgList::for_sig(&sig);
    args.set(0, 5_i32);
    args.set(1, false);
    proxy.invoke(&declaring, "do_it", &mut args).unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(args.get::<i32>(2), Some(&-2));

    // A call that starts out vetoed stays vetoed.
    let mut args = ArgList::for_sig(&sig);
    args.set(0, 0_i32);
    args.set(1, false);
    proxy.invoke(&declaring, "do_it", &mut args).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn generic_instantiations_dispatch_independently() {
    let (proxy, _worker, config) = worker_proxy();
    let declaring = TypeKey::new("IWorker");

    // Advice keyed to one instantiation only.
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    config
        .add_advice(Advice::Around(Arc::new(FnInterceptor::new(move |ctx| {
            if ctx.generic_args() == [TypeKey::new("hex")] {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            ctx.proceed()
        }))))
        .unwrap();

    let sig = OperationSig::generic(declaring.clone(), "echo_as", vec![ParamSpec::input("v")], 1);

    let mut args = ArgList::for_sig(&sig);
    args.set(0, 7_i32);
    let hex = proxy
        .invoke_generic(&declaring, "echo_as", &[TypeKey::new("hex")], &mut args)
        .unwrap();
    assert_eq!(*hex.downcast::<String>().unwrap(), "hex:7");

    let mut args = ArgList::for_sig(&sig);
    args.set(0, 7_i32);
    let dec = proxy
        .invoke_generic(&declaring, "echo_as", &[TypeKey::new("dec")], &mut args)
        .unwrap();
    assert_eq!(*dec.downcast::<String>().unwrap(), "dec:7");

    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let err = proxy
        .invoke_generic(&declaring, "echo_as", &[], &mut ArgList::for_sig(&sig))
        .unwrap_err();
    assert!(matches!(err, Error::GenericArityMismatch { .. }));
}

#[test]
fn interceptor_can_absorb_a_missing_target() {
    let mut config = ProxyConfig::new();
    config.add_surface(worker_surface());
    // No target at all.
    config
        .add_advice(Advice::Around(Arc::new(FnInterceptor::new(|_ctx| {
            Ok(ret(0_usize))
        }))))
        .unwrap();

    let proxy = create_dispatcher(&config).unwrap();
    let declaring = TypeKey::new("IWorker");
    let mut args = ArgList::empty();
    let result = proxy.invoke(&declaring, "bump", &mut args).unwrap();
    assert_eq!(*result.downcast::<usize>().unwrap(), 0);

    // The same proxy without the absorbing interceptor surfaces the absence.
    let mut bare = ProxyConfig::new();
    bare.add_surface(worker_surface());
    let bare_proxy = create_dispatcher(&bare).unwrap();
    let err = bare_proxy
        .invoke(&declaring, "bump", &mut ArgList::empty())
        .unwrap_err();
    assert!(matches!(err, Error::TargetUnavailable { .. }));
}

#[test]
fn unknown_operations_are_rejected() {
    let (proxy, _worker, _config) = worker_proxy();
    let err = proxy
        .invoke(&TypeKey::new("IWorker"), "missing", &mut ArgList::empty())
        .unwrap_err();
    assert!(matches!(err, Error::OperationNotFound { .. }));
}

#[test]
fn concurrent_calls_share_one_dispatcher() {
    let (proxy, worker, config) = worker_proxy();
    config
        .add_advice(Advice::Around(Arc::new(FnInterceptor::new(|ctx| {
            ctx.proceed()
        }))))
        .unwrap();

    let proxy = Arc::new(proxy);
    let declaring = TypeKey::new("IWorker");
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let proxy = proxy.clone();
            let declaring = declaring.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let mut args = ArgList::empty();
                    proxy.invoke(&declaring, "bump", &mut args).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(worker.calls.load(Ordering::SeqCst), 800);
}
