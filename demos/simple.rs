// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Two replicas edit the same profile concurrently, exchange their changes and end up with the
//! same content.

use crdoc::{Doc, ReadTxn, json::ToJson, prelim};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // Every replica needs a client id that is unique among all replicas of the document.
    let alice = Doc::with_client_id(1);
    let bob = Doc::with_client_id(2);

    // Root branches are addressed by name. Every replica opens them the same way.
    let profile_a = alice.get_or_insert_map("profile")?;
    let profile_b = bob.get_or_insert_map("profile")?;

    // --- Alice creates the profile ---
    let initial = {
        let mut txn = alice.try_transact_mut()?;
        profile_a.insert(&mut txn, "name", "Alice")?;
        profile_a.insert(&mut txn, "tags", prelim!(["admin"]))?;
        txn.commit()?.encode_v1()
    };
    println!("1. Alice created the profile ({} bytes).", initial.len());

    // --- Bob receives it ---
    {
        let mut txn = bob.try_transact_mut()?;
        txn.apply_update(&initial)?;
        txn.commit()?;
    }
    println!("2. Bob applied Alice's update.");

    // --- Both edit concurrently ---
    let from_alice = {
        let mut txn = alice.try_transact_mut()?;
        profile_a.insert(&mut txn, "email", "alice@example.com")?;
        let tags = profile_a.get(&txn, "tags")?.and_then(|out| out.as_array().cloned());
        if let Some(tags) = tags {
            tags.push_back(&mut txn, "owner")?;
        }
        txn.commit()?.encode_v1()
    };
    let from_bob = {
        let mut txn = bob.try_transact_mut()?;
        profile_b.insert(&mut txn, "email", "alice@work.example")?;
        let tags = profile_b.get(&txn, "tags")?.and_then(|out| out.as_array().cloned());
        if let Some(tags) = tags {
            tags.push_front(&mut txn, "reviewer")?;
        }
        txn.commit()?.encode_v1()
    };
    println!("3. Alice and Bob changed the email at the same time.");

    // --- Exchange ---
    for (doc, update) in [(&alice, &from_bob), (&bob, &from_alice)] {
        let mut txn = doc.try_transact_mut()?;
        txn.apply_update(update)?;
        txn.commit()?;
    }

    // Both edits to "tags" survive. For "email" the write of the higher client id wins.
    let a = alice.to_json(&alice.try_transact()?)?;
    let b = bob.to_json(&bob.try_transact()?)?;
    println!("4. Alice sees {a}");
    println!("   Bob sees   {b}");
    assert_eq!(a, b);

    let txn = bob.try_transact()?;
    println!("5. Bob's state vector: {:?}", txn.state_vector()?);
    Ok(())
}
