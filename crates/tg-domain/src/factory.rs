// factory.rs — Domain constraint factories.
//
// A DomainFactory maps a description tag ("int", "date", ...) to the
// producer that turns such a node into a Domain. The table is built once
// (usually with `with_defaults`) and owned by whoever parses descriptions;
// there is no process-wide registry. Producers receive the tick clock at
// produce time so that calendar values can be converted into ticks.
//
// Numeric nodes accept either `value` (a singleton) or `min`/`max`; a bound
// may be written as "-inf", "+inf" or "inf", and an absent bound is
// unbounded. Date and duration nodes convert lower bounds with floor and
// upper bounds with ceil, each bound on its own.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::str::FromStr;

use tg_clock::{Rounding, Tick, TickClock};

use crate::domain::{Bound, Domain, Interval};
use crate::error::DomainError;
use crate::node::Node;

/// Tags registered by [`DomainFactory::with_defaults`].
pub const INT_TAG: &str = "int";
pub const FLOAT_TAG: &str = "float";
pub const BOOL_TAG: &str = "bool";
pub const ENUM_TAG: &str = "enum";
pub const STRING_TAG: &str = "string";
pub const DATE_TAG: &str = "date";
pub const DURATION_TAG: &str = "duration";

/// Child tag holding one symbol of an `enum` node.
pub const ELEM_TAG: &str = "elem";

/// Builds a domain from a description node.
pub trait DomainProducer: Send + Sync {
    fn produce(&self, node: &Node, clock: &TickClock) -> Result<Domain, DomainError>;
}

impl<F> DomainProducer for F
where
    F: Fn(&Node, &TickClock) -> Result<Domain, DomainError> + Send + Sync,
{
    fn produce(&self, node: &Node, clock: &TickClock) -> Result<Domain, DomainError> {
        self(node, clock)
    }
}

/// Table of domain producers keyed by tag.
#[derive(Default)]
pub struct DomainFactory {
    producers: BTreeMap<String, Box<dyn DomainProducer>>,
}

impl DomainFactory {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with the built-in producers (int, float, bool, enum, string, date, duration).
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        let builtins: [(&str, Box<dyn DomainProducer>); 7] = [
            (INT_TAG, Box::new(produce_int)),
            (FLOAT_TAG, Box::new(produce_float)),
            (BOOL_TAG, Box::new(produce_bool)),
            (ENUM_TAG, Box::new(produce_enum)),
            (STRING_TAG, Box::new(produce_string)),
            (DATE_TAG, Box::new(produce_date)),
            (DURATION_TAG, Box::new(produce_duration)),
        ];
        for (tag, producer) in builtins {
            factory.producers.insert(tag.to_string(), producer);
        }
        factory
    }

    /// Register a producer for a new tag.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        producer: impl DomainProducer + 'static,
    ) -> Result<(), DomainError> {
        let tag = tag.into();
        if self.producers.contains_key(&tag) {
            return Err(DomainError::DuplicateTag(tag));
        }
        tracing::debug!(tag = %tag, "domain producer registered");
        self.producers.insert(tag, Box::new(producer));
        Ok(())
    }

    /// Remove a producer. Returns whether one was registered.
    pub fn unregister(&mut self, tag: &str) -> bool {
        self.producers.remove(tag).is_some()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.producers.contains_key(tag)
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.producers.keys().map(String::as_str)
    }

    /// Build the domain described by `node`, selecting the producer by its tag.
    pub fn produce(&self, node: &Node, clock: &TickClock) -> Result<Domain, DomainError> {
        let producer = self
            .producers
            .get(&node.tag)
            .ok_or_else(|| DomainError::UnknownTag(node.tag.clone()))?;
        producer.produce(node, clock)
    }
}

impl std::fmt::Debug for DomainFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainFactory")
            .field("tags", &self.producers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn produce_int(node: &Node, _clock: &TickClock) -> Result<Domain, DomainError> {
    numeric_interval::<i64>(node).map(Domain::Int)
}

fn produce_float(node: &Node, _clock: &TickClock) -> Result<Domain, DomainError> {
    numeric_interval::<f64>(node).map(Domain::Float)
}

fn produce_bool(node: &Node, _clock: &TickClock) -> Result<Domain, DomainError> {
    let value = match node.attr("value") {
        None => None,
        Some(raw) => Some(match raw.trim() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => return Err(node.invalid_attr("value", raw, "expected true or false")),
        }),
    };
    Ok(Domain::Bool(value))
}

fn produce_enum(node: &Node, _clock: &TickClock) -> Result<Domain, DomainError> {
    let mut symbols = BTreeSet::new();
    if let Some(value) = node.attr("value") {
        symbols.insert(value.to_string());
    }
    for elem in node.children_tagged(ELEM_TAG) {
        symbols.insert(elem.require_attr("value")?.to_string());
    }
    if symbols.is_empty() {
        return Err(DomainError::MalformedNode {
            node: node.tag.clone(),
            reason: "expected a value attribute or <elem> children".to_string(),
        });
    }
    Ok(Domain::Enum(symbols))
}

fn produce_string(node: &Node, _clock: &TickClock) -> Result<Domain, DomainError> {
    Ok(Domain::symbol(node.require_attr("value")?))
}

fn produce_date(node: &Node, clock: &TickClock) -> Result<Domain, DomainError> {
    tick_interval(node, |text, rounding| {
        let date = tg_clock::parse_date(text)?;
        clock.time_to_tick(date, rounding)
    })
    .map(Domain::Int)
}

fn produce_duration(node: &Node, clock: &TickClock) -> Result<Domain, DomainError> {
    tick_interval(node, |text, rounding| {
        clock.as_duration(text, rounding == Rounding::Ceil)
    })
    .map(Domain::Int)
}

/// Read `value` or `min`/`max` from a numeric node.
fn numeric_interval<T>(node: &Node) -> Result<Interval<T>, DomainError>
where
    T: Copy + PartialOrd + Display + FromStr,
    T::Err: Display,
{
    if let Some(raw) = node.attr("value") {
        return match parse_bound::<T>(node, "value", raw)? {
            Bound::Finite(v) => Interval::new(Bound::Finite(v), Bound::Finite(v)),
            _ => Err(node.invalid_attr("value", raw, "a singleton must be finite")),
        };
    }
    let lower = match node.attr("min") {
        Some(raw) => parse_bound(node, "min", raw)?,
        None => Bound::MinusInf,
    };
    let upper = match node.attr("max") {
        Some(raw) => parse_bound(node, "max", raw)?,
        None => Bound::PlusInf,
    };
    Interval::new(lower, upper)
}

fn parse_bound<T>(node: &Node, key: &str, raw: &str) -> Result<Bound<T>, DomainError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw.trim() {
        "-inf" => Ok(Bound::MinusInf),
        "+inf" | "inf" => Ok(Bound::PlusInf),
        text => text
            .parse()
            .map(Bound::Finite)
            .map_err(|e: T::Err| node.invalid_attr(key, raw, e)),
    }
}

/// Read `value` or `min`/`max` from a date/duration node as ticks.
///
/// A `value` spans the ticks around it: floor for the lower end, ceil for
/// the upper end. Each bound is converted independently of the other.
fn tick_interval<F>(node: &Node, convert: F) -> Result<Interval<Tick>, DomainError>
where
    F: Fn(&str, Rounding) -> Result<Tick, tg_clock::ClockError>,
{
    let at = |key: &str, raw: &str, rounding: Rounding| -> Result<Bound<Tick>, DomainError> {
        match raw.trim() {
            "-inf" => Ok(Bound::MinusInf),
            "+inf" | "inf" => Ok(Bound::PlusInf),
            text => convert(text, rounding)
                .map(Bound::Finite)
                .map_err(|e| node.invalid_attr(key, raw, e)),
        }
    };

    let (lower, upper) = match node.attr("value") {
        Some(raw) => (
            at("value", raw, Rounding::Floor)?,
            at("value", raw, Rounding::Ceil)?,
        ),
        None => (
            match node.attr("min") {
                Some(raw) => at("min", raw, Rounding::Floor)?,
                None => Bound::MinusInf,
            },
            match node.attr("max") {
                Some(raw) => at("max", raw, Rounding::Ceil)?,
                None => Bound::PlusInf,
            },
        ),
    };
    Interval::new(lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn clock(secs: i64) -> TickClock {
        TickClock::new(TimeDelta::seconds(secs)).unwrap()
    }

    #[test]
    fn defaults_cover_builtin_tags() {
        let factory = DomainFactory::with_defaults();
        let tags: Vec<&str> = factory.tags().collect();
        assert_eq!(
            tags,
            vec!["bool", "date", "duration", "enum", "float", "int", "string"]
        );
    }

    #[test]
    fn duplicate_and_unknown_tags_are_errors() {
        let mut factory = DomainFactory::with_defaults();
        let err = factory
            .register("int", |_: &Node, _: &TickClock| -> Result<Domain, DomainError> {
                Ok(Domain::int(0))
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateTag(tag) if tag == "int"));

        let err = factory.produce(&Node::new("colour"), &clock(1)).unwrap_err();
        assert!(matches!(err, DomainError::UnknownTag(tag) if tag == "colour"));
    }

    #[test]
    fn custom_producer_can_be_registered_and_removed() {
        let mut factory = DomainFactory::new();
        factory
            .register("depth", |node: &Node, _: &TickClock| -> Result<Domain, DomainError> {
                let metres: f64 = node.parse_attr("m")?.unwrap_or(0.0);
                Ok(Domain::float(-metres))
            })
            .unwrap();
        let depth = factory
            .produce(&Node::new("depth").with_attr("m", 20), &clock(1))
            .unwrap();
        assert_eq!(depth, Domain::float(-20.0));
        assert!(factory.unregister("depth"));
        assert!(!factory.contains("depth"));
    }

    #[test]
    fn numeric_nodes() {
        let factory = DomainFactory::with_defaults();
        let c = clock(1);

        let single = factory
            .produce(&Node::new("int").with_attr("value", 3), &c)
            .unwrap();
        assert_eq!(single, Domain::int(3));

        let open = factory
            .produce(&Node::new("float").with_attr("min", "-1.5").with_attr("max", "inf"), &c)
            .unwrap();
        let open = open.as_float().unwrap();
        assert_eq!(open.lower(), Bound::Finite(-1.5));
        assert_eq!(open.upper(), Bound::PlusInf);

        let unbounded = factory.produce(&Node::new("int"), &c).unwrap();
        assert!(unbounded.as_int().unwrap().is_full());

        assert!(matches!(
            factory.produce(&Node::new("int").with_attr("min", 5).with_attr("max", 1), &c),
            Err(DomainError::EmptyDomain(_))
        ));
        assert!(matches!(
            factory.produce(&Node::new("int").with_attr("value", "three"), &c),
            Err(DomainError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn nan_float_is_rejected() {
        let factory = DomainFactory::with_defaults();
        let c = clock(1);
        for node in [
            Node::new("float").with_attr("value", "NaN"),
            Node::new("float").with_attr("min", "NaN"),
            Node::new("float").with_attr("max", "nan"),
        ] {
            assert!(
                matches!(factory.produce(&node, &c), Err(DomainError::EmptyDomain(_))),
                "{:?} should be refused",
                node
            );
        }
    }

    #[test]
    fn bool_enum_and_string_nodes() {
        let factory = DomainFactory::with_defaults();
        let c = clock(1);

        assert_eq!(
            factory.produce(&Node::new("bool"), &c).unwrap(),
            Domain::Bool(None)
        );
        assert_eq!(
            factory
                .produce(&Node::new("bool").with_attr("value", "true"), &c)
                .unwrap(),
            Domain::boolean(true)
        );

        let paths = factory
            .produce(
                &Node::new("enum")
                    .with_child(Node::new("elem").with_attr("value", "square"))
                    .with_child(Node::new("elem").with_attr("value", "lawnmower")),
                &c,
            )
            .unwrap();
        assert!(!paths.is_singleton());
        assert!(factory.produce(&Node::new("enum"), &c).is_err());

        let text = factory
            .produce(&Node::new("string").with_attr("value", "Holds"), &c)
            .unwrap();
        assert_eq!(text.as_symbol(), Some("Holds"));
    }

    #[test]
    fn date_value_spans_surrounding_ticks() {
        let factory = DomainFactory::with_defaults();
        let c = clock(2);

        // 5 s after the epoch falls inside tick 2 (4 s .. 6 s).
        let between = factory
            .produce(
                &Node::new("date").with_attr("value", "1970-01-01T00:00:05Z"),
                &c,
            )
            .unwrap();
        assert_eq!(
            between.as_int().unwrap(),
            &Interval::new(Bound::Finite(2), Bound::Finite(3)).unwrap()
        );

        let exact = factory
            .produce(
                &Node::new("date").with_attr("value", "1970-01-01T00:00:06Z"),
                &c,
            )
            .unwrap();
        assert_eq!(exact, Domain::int(3));
    }

    #[test]
    fn duration_bounds_round_outward_independently() {
        let factory = DomainFactory::with_defaults();
        let c = clock(2);

        let range = factory
            .produce(
                &Node::new("duration")
                    .with_attr("min", "00:00:03")
                    .with_attr("max", "00:00:07"),
                &c,
            )
            .unwrap();
        assert_eq!(
            range.as_int().unwrap(),
            &Interval::new(Bound::Finite(1), Bound::Finite(4)).unwrap()
        );

        let upper_only = factory
            .produce(&Node::new("duration").with_attr("max", "5"), &c)
            .unwrap();
        let upper_only = upper_only.as_int().unwrap();
        assert_eq!(upper_only.lower(), Bound::MinusInf);
        assert_eq!(upper_only.upper(), Bound::Finite(3));
    }

    #[test]
    fn malformed_dates_are_reported() {
        let factory = DomainFactory::with_defaults();
        let err = factory
            .produce(&Node::new("date").with_attr("value", "yesterday"), &clock(1))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidAttribute { attribute, .. } if attribute == "value"));
    }
}
