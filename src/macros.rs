// (c) Copyright 2025 Helsing GmbH. All rights reserved.
/// Convenience macro for creating a [`Value`](crate::Value).
///
/// ```rust
/// # use crdoc::{any, Value};
/// assert_eq!(any!(null), Value::Null);
/// assert_eq!(any!(undefined), Value::Undefined);
/// assert_eq!(any!("hello"), Value::String("hello".into()));
/// assert_eq!(any!(-3), Value::Int(-3));
/// ```
#[macro_export]
macro_rules! any {
    (null) => {
        $crate::Value::Null
    };
    (undefined) => {
        $crate::Value::Undefined
    };
    ($v:expr) => {
        $crate::Value::from($v)
    };
}

/// Convenience macro for creating preliminary content, that is, an [`In`](crate::In).
///
/// Map literal (note the '{' and '}'):
/// ```rust
/// # use crdoc::prelim;
/// let config = prelim!({
///     "name" => "crdoc",
///     "retries" => 3,
///     "tags" => ["crdt", "sync"],
///     "owner" => { "id" => 7, "email" => null }
/// });
/// ```
///
/// Array literal (note the '[' and ']'):
/// ```rust
/// # use crdoc::prelim;
/// let list = prelim!([1, 2.5, "three", (-4), [true, false]]);
/// ```
///
/// Nested values are single token trees, so anything longer than one token (a negative number,
/// a function call) needs parentheses.
#[macro_export]
macro_rules! prelim {
    // Map
    ({$($k:literal => $v:tt),* $(,)?}) => {
        {
            #[allow(unused_mut)]
            let mut map = ::std::collections::BTreeMap::<String, $crate::In>::new();
            $( map.insert(::std::string::String::from($k), $crate::prelim!($v)); )*
            $crate::In::Map(map)
        }
    };

    // Array
    ([$($v:tt),* $(,)?]) => {
        $crate::In::Array(vec![$($crate::prelim!($v)),*])
    };

    (null) => {
        $crate::In::Any($crate::Value::Null)
    };

    ($v:expr) => {
        $crate::In::from($v)
    };
}

#[cfg(test)]
mod tests {
    use crate::{In, Value};
    use std::collections::BTreeMap;

    #[test]
    fn prelim_map_literal() {
        let input = prelim!({
            "x" => "Hello",
            "y" => (-1),
            "z" => { "nested" => [1, null] }
        });
        let expected = In::Map(BTreeMap::from([
            ("x".to_string(), In::Any(Value::from("Hello"))),
            ("y".to_string(), In::Any(Value::Int(-1))),
            (
                "z".to_string(),
                In::Map(BTreeMap::from([(
                    "nested".to_string(),
                    In::Array(vec![In::Any(Value::Int(1)), In::Any(Value::Null)]),
                )])),
            ),
        ]));
        assert_eq!(input, expected);
        assert_eq!(prelim!({}), In::map());
        assert_eq!(prelim!([]), In::array());
    }

    #[test]
    #[cfg(feature = "json")]
    fn prelim_content_is_inserted_as_branches() {
        use crate::{Doc, json::ToJson};

        let doc = Doc::with_client_id(1);
        let root = doc.get_or_insert_map("root").unwrap();
        let mut txn = doc.try_transact_mut().unwrap();
        root.insert(&mut txn, "cfg", prelim!({ "a" => [1, "b"], "c" => 2.5 }))
            .unwrap();
        insta::assert_snapshot!(
            root.to_json(&txn).unwrap(),
            @r#"{"cfg":{"a":[1,"b"],"c":2.5}}"#
        );
    }
}
