// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Three peers on their own threads edit a shared log and broadcast every commit to each other
//! through channels. Updates may arrive in any order; each peer converges once it has seen them
//! all.
//!
//! Run with `RUST_LOG=crdoc=debug` to see transactions being committed.

use crdoc::{Doc, Origin, ReadTxn, UpdateEvent};
use std::{error::Error, sync::mpsc, thread};
use tracing_subscriber::EnvFilter;

const PEERS: u64 = 3;
const EDITS: usize = 4;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let remote = Origin::from("remote");
    let (senders, receivers): (Vec<_>, Vec<_>) =
        (0..PEERS).map(|_| mpsc::channel::<Vec<u8>>()).unzip();
    let docs: Vec<_> = (1..=PEERS).map(Doc::with_client_id).collect();

    // broadcast local commits; updates applied on behalf of other peers are not echoed
    let _subscriptions: Vec<_> = docs
        .iter()
        .enumerate()
        .map(|(me, doc)| {
            let peers: Vec<_> = senders
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != me)
                .map(|(_, tx)| tx.clone())
                .collect();
            let remote = remote.clone();
            doc.observe_update(move |event: &UpdateEvent| {
                if event.origin.as_ref() == Some(&remote) {
                    return;
                }
                for peer in &peers {
                    // a peer that is gone has nothing left to converge
                    let _ = peer.send(event.update.clone());
                }
            })
        })
        .collect();

    let apply_incoming = |doc: &Doc, rx: &mpsc::Receiver<Vec<u8>>| -> crdoc::Result<usize> {
        let mut applied = 0;
        for update in rx.try_iter() {
            let mut txn = doc.try_transact_mut_with(remote.clone())?;
            txn.apply_update(&update)?;
            txn.commit()?;
            applied += 1;
        }
        Ok(applied)
    };

    let receivers = thread::scope(|scope| {
        let handles: Vec<_> = docs
            .iter()
            .zip(receivers)
            .enumerate()
            .map(|(me, (doc, rx))| {
                scope.spawn(move || -> crdoc::Result<_> {
                    let log = doc.get_or_insert_text("log")?;
                    for edit in 0..EDITS {
                        let mut txn = doc.try_transact_mut()?;
                        log.push(&mut txn, &format!("peer {me}: edit {edit}\n"))?;
                        txn.commit()?;
                        drop(txn);
                        apply_incoming(doc, &rx)?;
                    }
                    Ok(rx)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| "peer thread panicked"))
            .collect::<Result<Vec<_>, _>>()
    })?;

    // deliver whatever was still in flight when the peers stopped editing
    for (doc, rx) in docs.iter().zip(receivers) {
        let rx = rx?;
        let applied = apply_incoming(doc, &rx)?;
        let txn = doc.try_transact()?;
        assert!(!txn.has_pending()?);
        println!(
            "peer {} applied {applied} late updates, state vector {:?}",
            doc.client_id(),
            txn.state_vector()?
        );
    }

    let logs = docs
        .iter()
        .map(|doc| {
            let log = doc.get_or_insert_text("log")?;
            log.get_string(&doc.try_transact()?)
        })
        .collect::<crdoc::Result<Vec<_>>>()?;
    assert!(logs.windows(2).all(|pair| pair[0] == pair[1]));
    println!("converged log:\n{}", logs[0]);
    Ok(())
}
