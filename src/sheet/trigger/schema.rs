// Trigger schema - registry of event kinds and their typed fields
//
// The registry is process-wide and built once on first access through
// `schema()`. It is never mutated after construction, so shared references
// handed out to the editor, the loader and the playback cursor stay valid
// for the lifetime of the process.

use crate::sheet::column::ColumnId;
use crate::sheet::trigger::field::{Constraint, FieldSpec, FieldType, FieldValue};
use crate::sheet::tstamp::Tstamp;
use crate::sheet::{
    ARPEGGIO_NOTES_MAX, DSPS_MAX, EFFECTS_MAX, GENERATORS_MAX, HITS_MAX, INSTRUMENTS_MAX,
    PATTERN_INSTANCES_MAX, PATTERNS_MAX, SCALE_NOTES_MAX, SCALES_MAX, TEMPO_MAX, TEMPO_MIN,
};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Which part of the audio graph an event addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    Channel,
    Instrument,
    Generator,
    Dsp,
}

impl Scope {
    /// Scope implied by the leading character of a kind
    ///
    /// `W` and `m` are global, `I`, `G` and `D` address the instrument graph
    /// through a channel, and everything else (`C` and the short channel
    /// forms such as `n+` or `.i`) is a channel event.
    pub fn of_kind(kind: &str) -> Scope {
        match kind.chars().next() {
            Some('W') | Some('m') => Scope::Global,
            Some('I') => Scope::Instrument,
            Some('G') => Scope::Generator,
            Some('D') => Scope::Dsp,
            _ => Scope::Channel,
        }
    }

    /// Check whether a column accepts events of this scope
    pub fn fits(&self, column: ColumnId) -> bool {
        match column {
            ColumnId::Global => *self == Scope::Global,
            ColumnId::Channel(_) => *self != Scope::Global,
        }
    }
}

/// Check whether `kind` may be stored in `column`
pub fn kind_fits_column(kind: &str, column: ColumnId) -> bool {
    Scope::of_kind(kind).fits(column)
}

/// Description of one event kind
#[derive(Debug, Clone)]
pub struct KindSpec {
    pub kind: &'static str,
    pub scope: Scope,
    pub summary: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl KindSpec {
    fn new(kind: &'static str, summary: &'static str, fields: Vec<FieldSpec>) -> Self {
        Self {
            kind,
            scope: Scope::of_kind(kind),
            summary,
            fields,
        }
    }

    pub fn field_type(&self, index: usize) -> Option<FieldType> {
        self.fields.get(index).map(|f| f.ty)
    }

    pub fn defaults(&self) -> Vec<FieldValue> {
        self.fields.iter().map(|f| f.default.clone()).collect()
    }
}

/// Immutable map from kind names to field descriptors
#[derive(Debug)]
pub struct Schema {
    kinds: BTreeMap<&'static str, KindSpec>,
}

impl Schema {
    pub fn get(&self, kind: &str) -> Option<&KindSpec> {
        self.kinds.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &KindSpec> {
        self.kinds.values()
    }

    /// Kinds that may be entered in the given column, in name order
    pub fn kinds_for(&self, column: ColumnId) -> impl Iterator<Item = &KindSpec> {
        self.kinds.values().filter(move |k| k.scope.fits(column))
    }

    /// Kinds starting with `prefix` that fit `column`, for type-head completion
    pub fn complete(&self, prefix: &str, column: ColumnId) -> Vec<&'static str> {
        self.kinds_for(column)
            .filter(|k| k.kind.starts_with(prefix))
            .map(|k| k.kind)
            .collect()
    }
}

/// The process-wide trigger schema
pub fn schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(build_schema)
}

fn int(name: &'static str, lo: usize, hi: usize, default: i64) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::Int,
        Constraint::IntRange(lo as i64, hi as i64),
        FieldValue::Int(default),
    )
}

fn real(name: &'static str, constraint: Constraint, default: f64) -> FieldSpec {
    FieldSpec::new(name, FieldType::Real, constraint, FieldValue::Real(default))
}

fn note(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldType::Note, Constraint::Any, FieldValue::Real(0.0))
}

fn length(name: &'static str) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::Tstamp,
        Constraint::NonNegative,
        FieldValue::Tstamp(Tstamp::ZERO),
    )
}

fn flag(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldType::Bool, Constraint::Any, FieldValue::Bool(false))
}

fn key() -> FieldSpec {
    FieldSpec::new(
        "key",
        FieldType::Identifier,
        Constraint::Key,
        FieldValue::Str(String::new()),
    )
}

fn tempo() -> FieldSpec {
    real("tempo", Constraint::RealRange(TEMPO_MIN, TEMPO_MAX), 120.0)
}

fn force() -> FieldSpec {
    real("force", Constraint::RealRange(-384.0, 18.0), 0.0)
}

fn cutoff() -> FieldSpec {
    real("cutoff", Constraint::RealRange(0.0, 100.0), 100.0)
}

fn pan() -> FieldSpec {
    real("pan", Constraint::RealRange(-1.0, 1.0), 0.0)
}

fn any_real(name: &'static str) -> FieldSpec {
    real(name, Constraint::Any, 0.0)
}

fn non_negative(name: &'static str) -> FieldSpec {
    real(name, Constraint::NonNegative, 0.0)
}

/// Keyed variable setters shared by the instrument, generator and DSP scopes
fn variable_setters(prefix: &'static str) -> Vec<KindSpec> {
    let (b, i, f, t) = match prefix {
        "I" => ("I.B", "I.I", "I.F", "I.T"),
        "G" => ("G.B", "G.I", "G.F", "G.T"),
        _ => ("D.B", "D.I", "D.F", "D.T"),
    };
    vec![
        KindSpec::new(b, "set boolean variable", vec![key(), flag("value")]),
        KindSpec::new(
            i,
            "set integer variable",
            vec![
                key(),
                FieldSpec::new("value", FieldType::Int, Constraint::Any, FieldValue::Int(0)),
            ],
        ),
        KindSpec::new(f, "set real variable", vec![key(), any_real("value")]),
        KindSpec::new(
            t,
            "set timestamp variable",
            vec![
                key(),
                FieldSpec::new(
                    "value",
                    FieldType::Tstamp,
                    Constraint::Any,
                    FieldValue::Tstamp(Tstamp::ZERO),
                ),
            ],
        ),
    ]
}

fn build_schema() -> Schema {
    let mut specs = vec![
        // Global: playback position
        KindSpec::new("Wpd", "pattern delay", vec![length("delay")]),
        KindSpec::new("W.jc", "set jump counter", vec![int("counter", 0, 65536, 0)]),
        KindSpec::new("W.jr", "set jump row", vec![length("row")]),
        KindSpec::new("W.jp", "set jump pattern", vec![int("pattern", 0, PATTERNS_MAX, 0)]),
        KindSpec::new(
            "W.ji",
            "set jump instance",
            vec![int("instance", 0, PATTERN_INSTANCES_MAX, 0)],
        ),
        KindSpec::new("Wj", "jump", vec![]),
        // Global: scales
        KindSpec::new("W.s", "set scale", vec![int("scale", 0, SCALES_MAX, 0)]),
        KindSpec::new("W.so", "set scale offset", vec![any_real("offset")]),
        KindSpec::new("Wms", "mimic scale", vec![int("scale", 0, SCALES_MAX, 0)]),
        KindSpec::new(
            "W.sfp",
            "set scale fixed point",
            vec![int("note", 0, SCALE_NOTES_MAX, 0)],
        ),
        KindSpec::new(
            "Wssi",
            "shift scale intervals",
            vec![int("note", 0, SCALE_NOTES_MAX, 0)],
        ),
        // Global: tempo and volume
        KindSpec::new("W.t", "set tempo", vec![tempo()]),
        KindSpec::new("W/t", "slide tempo", vec![tempo()]),
        KindSpec::new("W/=t", "tempo slide length", vec![length("length")]),
        KindSpec::new("W.v", "set global volume", vec![any_real("volume")]),
        KindSpec::new("W/v", "slide global volume", vec![any_real("volume")]),
        KindSpec::new("W/=v", "global volume slide length", vec![length("length")]),
        KindSpec::new("mtempo", "set tempo", vec![tempo()]),
        KindSpec::new("mvol", "set global volume", vec![any_real("volume")]),
        KindSpec::new("mjump", "jump", vec![]),
        // Channel: notes and routing
        KindSpec::new("Cn+", "note on", vec![note("pitch")]),
        KindSpec::new("Cn-", "note off", vec![]),
        KindSpec::new("Ch", "hit", vec![int("hit", 0, HITS_MAX, 0)]),
        KindSpec::new(
            "C.i",
            "set instrument",
            vec![int("instrument", 0, INSTRUMENTS_MAX, 0)],
        ),
        KindSpec::new(
            "C.g",
            "set generator",
            vec![int("generator", 0, GENERATORS_MAX, 0)],
        ),
        KindSpec::new("C.d", "set DSP", vec![int("dsp", 0, DSPS_MAX, 0)]),
        KindSpec::new("C.e", "set effect", vec![int("effect", 0, EFFECTS_MAX, 0)]),
        KindSpec::new("n+", "note on", vec![note("pitch")]),
        KindSpec::new("n-", "note off", vec![]),
        KindSpec::new("h", "hit", vec![int("hit", 0, HITS_MAX, 0)]),
        KindSpec::new(
            ".i",
            "set instrument",
            vec![int("instrument", 0, INSTRUMENTS_MAX, 0)],
        ),
        KindSpec::new(".f", "set force", vec![force()]),
        KindSpec::new("cp", "carry pitch", vec![flag("enabled")]),
        // Channel: force and tremolo
        KindSpec::new("C.f", "set force", vec![force()]),
        KindSpec::new("C/f", "slide force", vec![force()]),
        KindSpec::new("C/=f", "force slide length", vec![length("length")]),
        KindSpec::new("CTs", "tremolo speed", vec![non_negative("speed")]),
        KindSpec::new(
            "CTd",
            "tremolo depth",
            vec![real("depth", Constraint::RealRange(0.0, 24.0), 0.0)],
        ),
        KindSpec::new("CTdd", "tremolo delay", vec![length("delay")]),
        // Channel: pitch and vibrato
        KindSpec::new("C/p", "slide pitch", vec![note("pitch")]),
        KindSpec::new("C/=p", "pitch slide length", vec![length("length")]),
        KindSpec::new("CVs", "vibrato speed", vec![non_negative("speed")]),
        KindSpec::new("CVd", "vibrato depth", vec![non_negative("depth")]),
        KindSpec::new("CVdd", "vibrato delay", vec![length("delay")]),
        // Channel: arpeggio
        KindSpec::new("Carp+", "arpeggio on", vec![]),
        KindSpec::new("Carp-", "arpeggio off", vec![]),
        KindSpec::new("C.arpn", "set arpeggio note", vec![note("pitch")]),
        KindSpec::new(
            "C.arpi",
            "set arpeggio index",
            vec![int("index", 0, ARPEGGIO_NOTES_MAX, 0)],
        ),
        KindSpec::new(
            "C.arps",
            "set arpeggio speed",
            vec![real("speed", Constraint::Positive, 24.0)],
        ),
        // Channel: filter and autowah
        KindSpec::new("C.l", "set lowpass", vec![cutoff()]),
        KindSpec::new("C/l", "slide lowpass", vec![cutoff()]),
        KindSpec::new("C/=l", "lowpass slide length", vec![length("length")]),
        KindSpec::new("CAs", "autowah speed", vec![non_negative("speed")]),
        KindSpec::new("CAd", "autowah depth", vec![non_negative("depth")]),
        KindSpec::new("CAdd", "autowah delay", vec![length("delay")]),
        KindSpec::new(
            "C.r",
            "set resonance",
            vec![real("resonance", Constraint::RealRange(0.0, 100.0), 0.0)],
        ),
        // Channel: panning
        KindSpec::new("C.P", "set panning", vec![pan()]),
        KindSpec::new("C/P", "slide panning", vec![pan()]),
        KindSpec::new("C/=P", "panning slide length", vec![length("length")]),
        // Instrument
        KindSpec::new(
            "I.ped",
            "set pedal",
            vec![real("pedal", Constraint::RealRange(0.0, 1.0), 0.0)],
        ),
        // Generator and DSP slides
        KindSpec::new("G/F", "slide real variable", vec![key(), any_real("value")]),
        KindSpec::new("G/=F", "real variable slide length", vec![key(), length("length")]),
        KindSpec::new("D/F", "slide real variable", vec![key(), any_real("value")]),
        KindSpec::new("D/=F", "real variable slide length", vec![key(), length("length")]),
    ];

    for prefix in ["I", "G", "D"] {
        specs.extend(variable_setters(prefix));
    }

    Schema {
        kinds: specs.into_iter().map(|spec| (spec.kind, spec)).collect(),
    }
}
