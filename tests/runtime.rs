use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use xlpr_runtime::Runtime::{Reply, Runtime};
use xlpr_runtime::Wire::Structs::{
    AsyncOutcome, BatchAsyncResponse, Cell, CycleEndResponse, Range, Rect, RtdConnectRequest,
    RtdUpdate,
};
use xlpr_runtime::Wire::{decode, encode, msg_type};
use xlpr_runtime::{
    ChannelBuilder, EventHooks, HostReceiver, RuntimeBuilder, RuntimeConfig, RuntimeError,
    ScalarValue, Transport,
};

fn no_user(_: u32, _: &[u8], _: &mut [u8]) -> Option<Reply> {
    None
}

fn start(hooks: EventHooks) -> Result<(Runtime, HostReceiver), RuntimeError> {
    let (tx, rx) = ChannelBuilder::new().with_slots(64).build()?;
    let transport: Arc<dyn Transport> = Arc::new(tx);
    let runtime = RuntimeBuilder::new()
        .with_config(RuntimeConfig {
            retry_base_delay: Duration::from_millis(1),
            ..RuntimeConfig::default()
        })
        .with_transport(transport)
        .with_hooks(hooks)
        .with_sweeper(false)
        .build()?;
    Ok((runtime, rx))
}

#[test]
fn builder_rejects_bad_config_and_missing_transport() {
    let bad = RuntimeConfig {
        async_max_batch: 0,
        ..RuntimeConfig::default()
    };
    let (tx, _rx) = ChannelBuilder::new().build().expect("channel");
    let err = RuntimeBuilder::new()
        .with_config(bad)
        .with_transport(Arc::new(tx))
        .build()
        .expect_err("zero batch");
    assert!(matches!(err, RuntimeError::Config(_)));

    let err = Runtime::builder().build().expect_err("no transport");
    assert!(matches!(err, RuntimeError::Config(_)));
}

#[test]
#[serial]
fn async_results_reach_the_host_on_shutdown() -> Result<(), RuntimeError> {
    let (runtime, rx) = start(EventHooks::new())?;

    for i in 0..20u8 {
        runtime
            .queue_async_result(vec![i], AsyncOutcome::Result(ScalarValue::Int(i as i32)))
            .expect("queue open");
    }
    runtime.shutdown();

    let mut handles = Vec::new();
    for frame in rx.drain() {
        assert_eq!(frame.msg_type, msg_type::BATCH_ASYNC_RESPONSE);
        let batch: BatchAsyncResponse = decode(&frame.payload).expect("decode");
        handles.extend(batch.results.into_iter().map(|r| r.handle));
    }
    assert_eq!(handles, (0..20u8).map(|i| vec![i]).collect::<Vec<_>>());
    assert_eq!(runtime.async_stats().results_delivered, 20);
    assert!(runtime
        .queue_async_result(vec![0], AsyncOutcome::Error("late".into()))
        .is_err());
    Ok(())
}

#[test]
fn cycle_end_round_trip() -> Result<(), RuntimeError> {
    let (runtime, _rx) = start(EventHooks::new())?;
    let target = Range::new("Sheet1", vec![Rect::new(0, 2, 0, 2)]);
    runtime.commands().schedule_set(&target, ScalarValue::Num(4.0));
    runtime.ref_cache().set("r", b"cached");

    let mut resp = vec![0u8; 1 << 16];
    let reply = runtime
        .dispatch(msg_type::CALCULATION_ENDED, &[], &mut resp, &mut no_user)
        .expect("reply");
    assert_eq!(reply.msg_type, msg_type::CALCULATION_ENDED);

    let cycle: CycleEndResponse = decode(&resp[..reply.len]).expect("decode");
    assert_eq!(cycle.commands.len(), 1);
    assert_eq!(cycle.commands[0].target(), &target);
    assert!(runtime.ref_cache().is_empty());
    Ok(())
}

#[test]
fn rtd_connect_hook_can_subscribe_and_publish() -> Result<(), RuntimeError> {
    let (subscribed_tx, subscribed) = crossbeam_channel::bounded(1);
    let rtd_slot = Arc::new(parking_lot::Mutex::new(None::<Arc<xlpr_runtime::Runtime::RtdManager>>));
    let slot = Arc::clone(&rtd_slot);

    let hooks = EventHooks::new().with_rtd_connect(move |req: &RtdConnectRequest| {
        if let (Some(rtd), Some(key)) = (slot.lock().clone(), req.args.first()) {
            rtd.subscribe(key.clone(), req.topic_id);
        }
        subscribed_tx.send(())?;
        Ok(())
    });
    let (runtime, rx) = start(hooks)?;
    *rtd_slot.lock() = Some(Arc::clone(runtime.rtd()));

    let req = RtdConnectRequest {
        topic_id: 21,
        args: vec!["ticker".into()],
        new_values: true,
    };
    let mut resp = [0u8; 64];
    let reply = runtime.dispatch(
        msg_type::RTD_CONNECT,
        &encode(&req).expect("encode"),
        &mut resp,
        &mut no_user,
    );
    assert_eq!(reply.map(|r| r.msg_type), Some(msg_type::RTD_CONNECT));
    subscribed
        .recv_timeout(Duration::from_secs(5))
        .expect("hook ran");

    runtime.rtd().publish("ticker", 101.5).expect("publish");

    let frame = rx
        .receive_timeout(Duration::from_secs(5))
        .expect("connected")
        .expect("update frame");
    assert_eq!(frame.msg_type, msg_type::RTD_UPDATE);
    let update: RtdUpdate = decode(&frame.payload).expect("decode");
    assert_eq!(
        update,
        RtdUpdate {
            topic_id: 21,
            value: ScalarValue::Num(101.5)
        }
    );
    Ok(())
}

#[test]
fn debug_output_names_components() -> Result<(), RuntimeError> {
    let (runtime, _rx) = start(EventHooks::new())?;
    runtime
        .commands()
        .schedule_set(&Range::new("S", vec![Rect::single(Cell::new(0, 0))]), 1.into());

    let text = format!("{runtime:?}");
    assert!(text.contains("CommandBatcher"));
    assert!(text.contains("buffered_cells: 1"));
    assert!(text.contains("ChunkManager"));
    assert!(text.contains("connected: true"));
    Ok(())
}
