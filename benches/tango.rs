// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use crdoc::{ArrayRef, Doc, MapRef, ReadTxn, StateVector, TextRef, Update};
use std::hint::black_box;
use tango_bench::{IntoBenchmarks, benchmark_fn, tango_benchmarks, tango_main};

/// A document with a 255 element array, a 255 entry map and a 255 character text.
fn populated() -> &'static (Doc, ArrayRef, MapRef, TextRef) {
    crdoc::enable_determinism();

    let doc = Doc::with_client_id(1);
    let array = doc.get_or_insert_array("array").unwrap();
    let map = doc.get_or_insert_map("map").unwrap();
    let text = doc.get_or_insert_text("text").unwrap();
    {
        let mut txn = doc.try_transact_mut().unwrap();
        for i in 0..255 {
            array.push_back(&mut txn, true).unwrap();
            map.insert(&mut txn, i.to_string(), i).unwrap();
            text.push(&mut txn, "x").unwrap();
        }
        txn.commit().unwrap();
    }
    Box::leak(Box::new((doc, array, map, text)))
}

// every iteration opens a write transaction and rolls it back by dropping it, so the document is
// the same for all iterations
fn array_benchmarks() -> impl IntoBenchmarks {
    let (doc, array, ..) = populated();
    [
        benchmark_fn("array::unshift", move |b| {
            b.iter(move || {
                let mut txn = doc.try_transact_mut().unwrap();
                array.push_front(&mut txn, black_box(true)).unwrap();
            })
        }),
        benchmark_fn("array::insert", move |b| {
            b.iter(move || {
                let mut txn = doc.try_transact_mut().unwrap();
                array.insert(&mut txn, black_box(128), false).unwrap();
            })
        }),
        benchmark_fn("array::push", move |b| {
            b.iter(move || {
                let mut txn = doc.try_transact_mut().unwrap();
                array.push_back(&mut txn, black_box(true)).unwrap();
            })
        }),
        benchmark_fn("array::delete", move |b| {
            b.iter(move || {
                let mut txn = doc.try_transact_mut().unwrap();
                array.remove(&mut txn, black_box(128)).unwrap();
            })
        }),
        benchmark_fn("array::get", move |b| {
            b.iter(move || {
                let txn = doc.try_transact().unwrap();
                array.get(&txn, black_box(200)).unwrap()
            })
        }),
    ]
}

fn map_benchmarks() -> impl IntoBenchmarks {
    let (doc, _, map, _) = populated();
    [
        benchmark_fn("map::insert", move |b| {
            b.iter(move || {
                let mut txn = doc.try_transact_mut().unwrap();
                map.insert(&mut txn, black_box("new"), true).unwrap();
            })
        }),
        benchmark_fn("map::update", move |b| {
            b.iter(move || {
                let mut txn = doc.try_transact_mut().unwrap();
                map.insert(&mut txn, black_box("128"), false).unwrap();
            })
        }),
        benchmark_fn("map::remove", move |b| {
            b.iter(move || {
                let mut txn = doc.try_transact_mut().unwrap();
                map.remove(&mut txn, black_box("128")).unwrap()
            })
        }),
        benchmark_fn("map::iter", move |b| {
            b.iter(move || {
                let txn = doc.try_transact().unwrap();
                map.iter(&txn).unwrap().count()
            })
        }),
    ]
}

fn text_benchmarks() -> impl IntoBenchmarks {
    let (doc, .., text) = populated();
    [
        benchmark_fn("text::insert", move |b| {
            b.iter(move || {
                let mut txn = doc.try_transact_mut().unwrap();
                text.insert(&mut txn, black_box(128), "hello").unwrap();
            })
        }),
        benchmark_fn("text::remove", move |b| {
            b.iter(move || {
                let mut txn = doc.try_transact_mut().unwrap();
                text.remove_range(&mut txn, black_box(64), 128).unwrap();
            })
        }),
        benchmark_fn("text::to-string", move |b| {
            b.iter(move || {
                let txn = doc.try_transact().unwrap();
                text.get_string(&txn).unwrap()
            })
        }),
    ]
}

fn codec_benchmarks() -> impl IntoBenchmarks {
    let (doc, ..) = populated();
    let full: &'static [u8] = {
        let txn = doc.try_transact().unwrap();
        let bytes = txn.encode_state_as_update(&StateVector::default()).unwrap();
        Box::leak(bytes.into_boxed_slice())
    };
    [
        benchmark_fn("codec::encode-full-state", move |b| {
            b.iter(move || {
                let txn = doc.try_transact().unwrap();
                txn.encode_state_as_update(black_box(&StateVector::default()))
                    .unwrap()
            })
        }),
        benchmark_fn("codec::decode", move |b| {
            b.iter(move || Update::decode_v1(black_box(full)).unwrap())
        }),
        benchmark_fn("codec::apply-to-empty", move |b| {
            b.iter(move || {
                let replica = Doc::with_client_id(2);
                let mut txn = replica.try_transact_mut().unwrap();
                txn.apply_update(black_box(full)).unwrap();
                txn.commit().unwrap()
            })
        }),
    ]
}

tango_benchmarks!(
    array_benchmarks(),
    map_benchmarks(),
    text_benchmarks(),
    codec_benchmarks()
);
tango_main!();
