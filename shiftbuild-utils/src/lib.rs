pub use shiftbuild_derive::Traverse;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

// Lets the derive's `::shiftbuild_utils` paths resolve inside this crate too.
extern crate self as shiftbuild_utils;

/// Walks every string stored in a value, handing each one to a [`Visitor`]
/// that may rewrite it in place.
pub trait Traverse {
    fn traverse<V: Visitor>(&mut self, visitor: &mut V);
}

pub trait Visitor {
    fn visit_string(&mut self, value: &mut String);
}

impl<T: Traverse> Traverse for Vec<T> {
    fn traverse<V: Visitor>(&mut self, visitor: &mut V) {
        for item in self {
            item.traverse(visitor);
        }
    }
}

impl<T: Traverse> Traverse for Option<T> {
    fn traverse<V: Visitor>(&mut self, visitor: &mut V) {
        if let Some(v) = self {
            v.traverse(visitor);
        }
    }
}

impl Traverse for String {
    fn traverse<V: Visitor>(&mut self, visitor: &mut V) {
        visitor.visit_string(self);
    }
}

impl Traverse for usize {
    fn traverse<V: Visitor>(&mut self, _: &mut V) {}
}

impl Traverse for bool {
    fn traverse<V: Visitor>(&mut self, _: &mut V) {}
}

/// Only values are visited; keys stay as they are.
impl<K: Eq + Hash, T: Traverse> Traverse for HashMap<K, T> {
    fn traverse<V: Visitor>(&mut self, visitor: &mut V) {
        for value in self.values_mut() {
            value.traverse(visitor);
        }
    }
}

impl<K: Ord, T: Traverse> Traverse for BTreeMap<K, T> {
    fn traverse<V: Visitor>(&mut self, visitor: &mut V) {
        for value in self.values_mut() {
            value.traverse(visitor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Visitor for Upper {
        fn visit_string(&mut self, value: &mut String) {
            *value = value.to_uppercase();
        }
    }

    #[derive(Traverse)]
    struct Named {
        name: String,
        aliases: Vec<String>,
        #[skip]
        raw: String,
        count: usize,
    }

    #[derive(Traverse)]
    enum Shape {
        Tuple(String, Option<String>),
        Fields { label: String },
        Unit,
    }

    #[test]
    fn derive_visits_struct_fields_except_skipped() {
        let mut named = Named {
            name: "a".to_string(),
            aliases: vec!["b".to_string(), "c".to_string()],
            raw: "d".to_string(),
            count: 3,
        };

        named.traverse(&mut Upper);

        assert_eq!(named.name, "A");
        assert_eq!(named.aliases, vec!["B", "C"]);
        assert_eq!(named.raw, "d");
        assert_eq!(named.count, 3);
    }

    #[test]
    fn derive_visits_enum_variants() {
        let mut tuple = Shape::Tuple("x".to_string(), Some("y".to_string()));
        tuple.traverse(&mut Upper);
        assert!(matches!(tuple, Shape::Tuple(ref a, Some(ref b)) if a == "X" && b == "Y"));

        let mut fields = Shape::Fields {
            label: "z".to_string(),
        };
        fields.traverse(&mut Upper);
        assert!(matches!(fields, Shape::Fields { ref label } if label == "Z"));

        let mut unit = Shape::Unit;
        unit.traverse(&mut Upper);
    }

    #[test]
    fn maps_visit_values_only() {
        let mut map = BTreeMap::new();
        map.insert("key".to_string(), "value".to_string());
        map.traverse(&mut Upper);
        assert_eq!(map.get("key").map(String::as_str), Some("VALUE"));
    }
}
