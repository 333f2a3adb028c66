//! Binary serialization boundary for dispatchers.
//!
//! Invoker closures cannot be serialized, so a dispatcher snapshot stores
//! structural identity (surface keys, flags, strategy) plus tagged byte blobs
//! for the components that carry state: the target, each advisor's pointcut,
//! and each advisor's advice. Restoring re-binds those tags against a
//! [`ProxyCodec`]: a registry of known surfaces and component constructors the
//! host application populates at startup.
//!
//! A dispatcher whose target and every advice/pointcut implement [`Snapshot`]
//! round-trips losslessly; any component without snapshot support fails
//! serialization with [`Error::NotSerializable`] naming it — advice is never
//! silently dropped. Dispatchers with introductions are not serializable.
//!
//! The envelope format is bincode with the standard configuration.

use std::collections::HashMap;
use std::sync::Arc;

use bincode::{Decode, Encode};

use crate::advice::Advice;
use crate::advisor::Advisor;
use crate::config::{ProxyConfig, ProxyFlags};
use crate::dispatch::{DispatchStrategy, ProxyDispatcher};
use crate::factory::create_dispatcher;
use crate::operation::{ConcreteSurface, OperationSurface};
use crate::pointcut::{NameMatchPointcut, PointcutRef, TruePointcut};
use crate::target::TargetSource;
use crate::{Error, Result};

/// Serializable proxy component: a stable tag plus a byte payload.
///
/// Implement this on targets (via [`TargetSource::as_snapshot`]), advice, and
/// pointcuts that should survive a round-trip, and register a matching decoder
/// under the same tag with [`ProxyCodec`].
pub trait Snapshot {
    /// Stable identifier resolved by the codec at restore time.
    fn snapshot_tag(&self) -> &str;

    /// Serializes the component's state.
    ///
    /// # Errors
    /// Implementations surface their own encoding failures.
    fn snapshot(&self) -> Result<Vec<u8>>;
}

const TAG_TRUE_POINTCUT: &str = "pointcut.true";
const TAG_NAME_MATCH_POINTCUT: &str = "pointcut.name-match";

impl Snapshot for TruePointcut {
    fn snapshot_tag(&self) -> &str {
        TAG_TRUE_POINTCUT
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

impl Snapshot for NameMatchPointcut {
    fn snapshot_tag(&self) -> &str {
        TAG_NAME_MATCH_POINTCUT
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        encode(&self.patterns().to_vec())
    }
}

/// Encodes a value with the crate's envelope configuration.
///
/// # Errors
/// Returns [`Error::Snapshot`] on encoding failure.
pub fn encode<T: Encode>(value: &T) -> Result<Vec<u8>> {
    bincode::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| Error::Snapshot(e.to_string()))
}

/// Decodes a value with the crate's envelope configuration.
///
/// # Errors
/// Returns [`Error::Snapshot`] on decoding failure.
pub fn decode<T: Decode<()>>(bytes: &[u8]) -> Result<T> {
    bincode::decode_from_slice(bytes, bincode::config::standard())
        .map(|(value, _)| value)
        .map_err(|e| Error::Snapshot(e.to_string()))
}

#[derive(Encode, Decode)]
struct TaggedBlob {
    tag: String,
    bytes: Vec<u8>,
}

impl TaggedBlob {
    fn of(component: &dyn Snapshot) -> Result<Self> {
        Ok(TaggedBlob {
            tag: component.snapshot_tag().to_string(),
            bytes: component.snapshot()?,
        })
    }
}

#[derive(Encode, Decode)]
struct AdvisorSnapshot {
    name: Option<String>,
    kind: String,
    pointcut: TaggedBlob,
    advice: TaggedBlob,
}

#[derive(Encode, Decode)]
struct DispatcherSnapshot {
    subclass: bool,
    flags: u8,
    target: Option<TaggedBlob>,
    surfaces: Vec<String>,
    concrete: Option<String>,
    advisors: Vec<AdvisorSnapshot>,
    frozen: bool,
}

/// Serializes a dispatcher into the binary envelope.
///
/// # Errors
/// Returns [`Error::NotSerializable`] naming the first component without
/// snapshot support, or [`Error::Snapshot`] on encoding failure.
pub fn snapshot_dispatcher(dispatcher: &ProxyDispatcher) -> Result<Vec<u8>> {
    if dispatcher.has_introductions() {
        return Err(Error::NotSerializable {
            component: "introductions".to_string(),
        });
    }
    let blueprint = &dispatcher.shape().blueprint;

    let target = match dispatcher.target_source().target_type() {
        Some(_) => {
            let Some(snapshot) = dispatcher.target_source().as_snapshot() else {
                return Err(Error::NotSerializable {
                    component: "target".to_string(),
                });
            };
            Some(TaggedBlob::of(snapshot)?)
        }
        None => None,
    };

    let mut advisors = Vec::new();
    for advisor in dispatcher.registry().advisors() {
        advisors.push(snapshot_advisor(&advisor)?);
    }

    encode(&DispatcherSnapshot {
        subclass: blueprint.strategy == DispatchStrategy::Subclass,
        flags: blueprint.flags.bits(),
        target,
        surfaces: blueprint
            .surfaces
            .iter()
            .map(|surface| surface.key().to_string())
            .collect(),
        concrete: blueprint
            .concrete
            .as_ref()
            .map(|surface| surface.key().to_string()),
        advisors,
        frozen: dispatcher.registry().is_frozen(),
    })
}

fn snapshot_advisor(advisor: &Advisor) -> Result<AdvisorSnapshot> {
    let describe = |part: &str| {
        Error::NotSerializable {
            component: match advisor.name() {
                Some(name) => format!("{part} of advisor `{name}`"),
                None => format!("{part} of {} advisor", advisor.kind()),
            },
        }
    };
    let pointcut = advisor
        .pointcut()
        .as_snapshot()
        .ok_or_else(|| describe("pointcut"))?;
    let advice = advisor.advice().as_snapshot().ok_or_else(|| describe("advice"))?;
    Ok(AdvisorSnapshot {
        name: advisor.name().map(ToString::to_string),
        kind: advisor.kind().to_string(),
        pointcut: TaggedBlob::of(pointcut)?,
        advice: TaggedBlob::of(advice)?,
    })
}

type AdviceDecoder = Arc<dyn Fn(&[u8]) -> Result<Advice> + Send + Sync>;
type PointcutDecoder = Arc<dyn Fn(&[u8]) -> Result<PointcutRef> + Send + Sync>;
type TargetDecoder = Arc<dyn Fn(&[u8]) -> Result<Arc<dyn TargetSource>> + Send + Sync>;

/// Restore-side registry: maps snapshot tags back to live components.
///
/// Surfaces (and concrete surfaces) are registered as complete definitions
/// because their invoker closures exist only in code; targets, advice, and
/// pointcuts are registered as tag-keyed decoders. The built-in pointcuts are
/// pre-registered.
pub struct ProxyCodec {
    surfaces: HashMap<String, Arc<OperationSurface>>,
    concretes: HashMap<String, ConcreteSurface>,
    advice: HashMap<String, AdviceDecoder>,
    pointcuts: HashMap<String, PointcutDecoder>,
    targets: HashMap<String, TargetDecoder>,
}

impl ProxyCodec {
    /// A codec with the built-in pointcut decoders registered.
    #[must_use]
    pub fn new() -> Self {
        let mut codec = ProxyCodec {
            surfaces: HashMap::new(),
            concretes: HashMap::new(),
            advice: HashMap::new(),
            pointcuts: HashMap::new(),
            targets: HashMap::new(),
        };
        codec.register_pointcut(TAG_TRUE_POINTCUT, |_| Ok(Arc::new(TruePointcut)));
        codec.register_pointcut(TAG_NAME_MATCH_POINTCUT, |bytes| {
            let patterns: Vec<String> = decode(bytes)?;
            Ok(Arc::new(NameMatchPointcut::from_patterns(patterns)))
        });
        codec
    }

    /// Registers a surface definition under its key.
    pub fn register_surface(&mut self, surface: Arc<OperationSurface>) -> &mut Self {
        self.surfaces.insert(surface.key().to_string(), surface);
        self
    }

    /// Registers a concrete surface definition under its key.
    pub fn register_concrete(&mut self, concrete: ConcreteSurface) -> &mut Self {
        self.concretes
            .insert(concrete.surface.key().to_string(), concrete);
        self
    }

    /// Registers an advice decoder for a tag.
    pub fn register_advice<F>(&mut self, tag: &str, decoder: F) -> &mut Self
    where
        F: Fn(&[u8]) -> Result<Advice> + Send + Sync + 'static,
    {
        self.advice.insert(tag.to_string(), Arc::new(decoder));
        self
    }

    /// Registers a pointcut decoder for a tag.
    pub fn register_pointcut<F>(&mut self, tag: &str, decoder: F) -> &mut Self
    where
        F: Fn(&[u8]) -> Result<PointcutRef> + Send + Sync + 'static,
    {
        self.pointcuts.insert(tag.to_string(), Arc::new(decoder));
        self
    }

    /// Registers a target-source decoder for a tag.
    pub fn register_target<F>(&mut self, tag: &str, decoder: F) -> &mut Self
    where
        F: Fn(&[u8]) -> Result<Arc<dyn TargetSource>> + Send + Sync + 'static,
    {
        self.targets.insert(tag.to_string(), Arc::new(decoder));
        self
    }

    /// Restores a dispatcher from its binary envelope.
    ///
    /// # Errors
    /// Returns [`Error::UnknownSnapshotTag`] for any tag or surface key the
    /// codec does not know, [`Error::Snapshot`] on a malformed envelope, or a
    /// construction error from the rebuilt configuration.
    pub fn restore(&self, bytes: &[u8]) -> Result<ProxyDispatcher> {
        let snapshot: DispatcherSnapshot = decode(bytes)?;
        let mut config = ProxyConfig::new();

        if let Some(target) = &snapshot.target {
            let decoder = self
                .targets
                .get(&target.tag)
                .ok_or_else(|| Error::UnknownSnapshotTag(target.tag.clone()))?;
            config.set_target_source(decoder(&target.bytes)?);
        }

        for key in &snapshot.surfaces {
            let surface = self
                .surfaces
                .get(key)
                .ok_or_else(|| Error::UnknownSnapshotTag(key.clone()))?;
            config.add_surface(Arc::clone(surface));
        }

        if let Some(key) = &snapshot.concrete {
            let concrete = self
                .concretes
                .get(key)
                .ok_or_else(|| Error::UnknownSnapshotTag(key.clone()))?;
            config.set_concrete(concrete.clone());
        }

        let flags = ProxyFlags::from_bits_truncate(snapshot.flags);
        config.proxy_target_type(snapshot.subclass || flags.contains(ProxyFlags::PROXY_TARGET_TYPE));
        config.propagate_attributes(flags.contains(ProxyFlags::PROPAGATE_ATTRIBUTES));

        for advisor in &snapshot.advisors {
            let pointcut_decoder = self
                .pointcuts
                .get(&advisor.pointcut.tag)
                .ok_or_else(|| Error::UnknownSnapshotTag(advisor.pointcut.tag.clone()))?;
            let advice_decoder = self
                .advice
                .get(&advisor.advice.tag)
                .ok_or_else(|| Error::UnknownSnapshotTag(advisor.advice.tag.clone()))?;
            let pointcut = pointcut_decoder(&advisor.pointcut.bytes)?;
            let advice = advice_decoder(&advisor.advice.bytes)?;
            let restored = match &advisor.name {
                Some(name) => Advisor::named(name, pointcut, advice),
                None => Advisor::new(pointcut, advice),
            };
            config.add_advisor(restored)?;
        }

        let dispatcher = create_dispatcher(&config)?;
        if snapshot.frozen {
            config.freeze();
        }
        Ok(dispatcher)
    }
}

impl Default for ProxyCodec {
    fn default() -> Self {
        ProxyCodec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_blob_roundtrip() {
        let pc = NameMatchPointcut::new().name("get*").name("ping");
        let blob = TaggedBlob::of(&pc).unwrap();
        assert_eq!(blob.tag, TAG_NAME_MATCH_POINTCUT);
        let patterns: Vec<String> = decode(&blob.bytes).unwrap();
        assert_eq!(patterns, vec!["get*".to_string(), "ping".to_string()]);
    }

    #[test]
    fn test_codec_rejects_unknown_tags() {
        let codec = ProxyCodec::new();
        let envelope = encode(&DispatcherSnapshot {
            subclass: false,
            flags: 0,
            target: Some(TaggedBlob {
                tag: "target.unknown".to_string(),
                bytes: Vec::new(),
            }),
            surfaces: vec![],
            concrete: None,
            advisors: vec![],
            frozen: false,
        })
        .unwrap();
        let err = codec.restore(&envelope).unwrap_err();
        assert!(matches!(err, Error::UnknownSnapshotTag(tag) if tag == "target.unknown"));
    }

    #[test]
    fn test_malformed_envelope_is_reported() {
        let codec = ProxyCodec::new();
        assert!(matches!(
            codec.restore(&[0xFF, 0xFE, 0x01]).unwrap_err(),
            Error::Snapshot(_)
        ));
    }
}
