// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use crdoc::{CodecError, Doc, Error, ReadTxn, StateVector, Update, prelim, update::VERSION_V1};

fn edit_session(client_id: u64) -> Update {
    let doc = Doc::with_client_id(client_id);
    let map = doc.get_or_insert_map("map").unwrap();
    let text = doc.get_or_insert_text("text").unwrap();
    let mut txn = doc.try_transact_mut().unwrap();
    map.insert(
        &mut txn,
        "cfg",
        prelim!({ "retries" => 3, "ratio" => 0.5, "blob" => (vec![0u8, 1, 2]) }),
    )
    .unwrap();
    map.insert(&mut txn, "flag", false).unwrap();
    text.push(&mut txn, "héllo").unwrap();
    text.remove_range(&mut txn, 1, 2).unwrap();
    map.remove(&mut txn, "flag").unwrap();
    txn.commit().unwrap()
}

#[test]
fn updates_round_trip() {
    let update = edit_session(9);
    let bytes = update.encode_v1();
    assert_eq!(bytes[0], VERSION_V1);
    assert_eq!(Update::decode_v1(&bytes).unwrap(), update);
}

#[test]
fn equal_change_sets_encode_identically() {
    // the same edits made by the same client produce byte-identical updates
    assert_eq!(edit_session(9).encode_v1(), edit_session(9).encode_v1());
    assert_ne!(edit_session(9).encode_v1(), edit_session(10).encode_v1());

    let update = edit_session(9);
    let reencoded = Update::decode_v1(&update.encode_v1()).unwrap().encode_v1();
    assert_eq!(reencoded, update.encode_v1());
}

#[test]
fn full_state_equals_the_committed_update() {
    let doc = Doc::with_client_id(1);
    let mut txn = doc.try_transact_mut().unwrap();
    txn.apply(edit_session(9)).unwrap();
    txn.commit().unwrap();
    drop(txn);

    let full = doc
        .try_transact()
        .unwrap()
        .encode_state_as_update(&StateVector::default())
        .unwrap();
    assert_eq!(Update::decode_v1(&full).unwrap(), edit_session(9));
}

#[test]
fn unknown_versions_are_rejected() {
    let mut bytes = edit_session(1).encode_v1();
    bytes[0] = 2;
    assert_eq!(
        Update::decode_v1(&bytes).unwrap_err(),
        Error::Version {
            found: 2,
            supported: VERSION_V1
        }
    );
    assert_eq!(
        Update::decode_v1(&[]).unwrap_err(),
        Error::Codec(CodecError::UnexpectedEnd)
    );
}

#[test]
fn corrupted_bytes_fail_cleanly() {
    let bytes = edit_session(1).encode_v1();
    for i in 1..bytes.len() {
        for flip in [0x01, 0x80, 0xff] {
            let mut corrupted = bytes.clone();
            corrupted[i] ^= flip;
            // any outcome but a panic is acceptable, and failures are codec errors
            if let Err(err) = Update::decode_v1(&corrupted) {
                assert!(matches!(err, Error::Codec(_)), "{err:?}");
            }
        }
    }

    let mut trailing = bytes;
    trailing.push(0);
    assert_eq!(
        Update::decode_v1(&trailing).unwrap_err(),
        Error::Codec(CodecError::TrailingBytes(1))
    );
}

#[test]
fn state_vectors_are_versioned_too() {
    let sv: StateVector = [(1, 5), (300, 2)].into_iter().collect();
    let bytes = sv.encode_v1();
    assert_eq!(StateVector::decode_v1(&bytes).unwrap(), sv);
    assert!(matches!(
        StateVector::decode_v1(&[7, 0]).unwrap_err(),
        Error::Version { found: 7, .. }
    ));
}
