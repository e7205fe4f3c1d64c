//! Configuration Resolver
//!
//! Turns stream requests and module requirements into a concrete device
//! and profile list. Pure function of its inputs: the same device list and
//! requests always give the same result.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use contracts::{
    Device, DeviceSerial, Format, PipelineError, ProcessingModule, Result, StreamKey, StreamKind,
    StreamProfile, StreamRequest,
};
use tracing::{debug, info, instrument};

use crate::request_set::StreamRequestSet;

/// Device and profiles selected at commit
#[derive(Debug, Clone)]
pub struct ResolvedConfiguration {
    pub device: Arc<dyn Device>,
    /// Ordered by (kind, index)
    pub profiles: Vec<StreamProfile>,
}

impl ResolvedConfiguration {
    pub fn serial(&self) -> &DeviceSerial {
        &self.device.info().serial
    }

    /// Active profile for (kind, index); index 0 selects the first of `kind`
    pub fn profile(&self, kind: StreamKind, index: u32) -> Option<StreamProfile> {
        self.profiles
            .iter()
            .find(|p| p.kind == kind && (index == 0 || p.index == index))
            .copied()
    }
}

struct FieldConflict {
    field: &'static str,
    left: String,
    right: String,
}

fn pick(field: &'static str, a: u32, b: u32) -> std::result::Result<u32, FieldConflict> {
    match (a, b) {
        (0, x) | (x, 0) => Ok(x),
        (x, y) if x == y => Ok(x),
        (x, y) => Err(FieldConflict {
            field,
            left: x.to_string(),
            right: y.to_string(),
        }),
    }
}

/// Field-wise union of two requests for the same (kind, index)
fn combine(
    a: &StreamRequest,
    b: &StreamRequest,
) -> std::result::Result<StreamRequest, FieldConflict> {
    let format = match (a.format, b.format) {
        (Format::Any, f) | (f, Format::Any) => f,
        (x, y) if x == y => x,
        (x, y) => {
            return Err(FieldConflict {
                field: "format",
                left: format!("{x:?}"),
                right: format!("{y:?}"),
            })
        }
    };

    Ok(StreamRequest {
        kind: a.kind,
        index: a.index,
        width: pick("width", a.width, b.width)?,
        height: pick("height", a.height, b.height)?,
        format,
        fps: pick("fps", a.fps, b.fps)?,
    })
}

/// Union of user requests and module requirements, in (kind, index) order
///
/// A field pinned on both sides with different values fails with
/// `Configuration`, whether the sides are two modules or a module and the
/// user.
pub fn merge_requirements(
    requests: &StreamRequestSet,
    modules: &[Arc<dyn ProcessingModule>],
) -> Result<Vec<StreamRequest>> {
    let mut merged: BTreeMap<StreamKey, (StreamRequest, String)> = BTreeMap::new();

    let module_reqs = modules.iter().flat_map(|m| {
        m.stream_requirements()
            .into_iter()
            .map(move |r| (r, format!("module '{}'", m.name())))
    });
    let user_reqs = requests.iter().map(|r| (*r, "stream request".to_string()));

    for (request, origin) in module_reqs.chain(user_reqs) {
        match merged.get_mut(&request.key()) {
            Some((existing, first_origin)) => {
                *existing = combine(existing, &request).map_err(|c| {
                    PipelineError::configuration(format!(
                        "{origin} conflicts with {first_origin} on {} #{} {}: {} vs {}",
                        request.kind, request.index, c.field, c.right, c.left
                    ))
                })?;
            }
            None => {
                merged.insert(request.key(), (request, origin));
            }
        }
    }

    Ok(merged.into_values().map(|(r, _)| r).collect())
}

/// Select a device and a concrete profile per request
///
/// With no requests, every stream of the device is enabled with its default
/// profile. Devices are tried in enumeration order (restricted to `serial`
/// when set); the first one satisfying every request wins.
///
/// # Errors
/// - `NoDevice` when nothing is connected or `serial` is not connected
/// - `Configuration` when no candidate satisfies every request
#[instrument(
    name = "pipeline_resolve",
    skip(devices, requests),
    fields(devices = devices.len(), requests = requests.len())
)]
pub fn resolve(
    devices: &[Arc<dyn Device>],
    requests: &[StreamRequest],
    serial: Option<&DeviceSerial>,
) -> Result<ResolvedConfiguration> {
    let candidates: Vec<&Arc<dyn Device>> = devices
        .iter()
        .filter(|d| serial.map_or(true, |s| d.info().serial == *s))
        .collect();

    if candidates.is_empty() {
        return Err(PipelineError::NoDevice {
            serial: serial.map(|s| s.to_string()),
        });
    }

    let mut first_error = None;
    for device in candidates {
        match resolve_on(device.as_ref(), requests) {
            Ok(profiles) => {
                info!(
                    serial = %device.info().serial,
                    device = %device.info().name,
                    streams = profiles.len(),
                    "configuration resolved"
                );
                for profile in &profiles {
                    debug!(profile = %profile, "stream selected");
                }
                return Ok(ResolvedConfiguration {
                    device: device.clone(),
                    profiles,
                });
            }
            Err(e) => {
                debug!(serial = %device.info().serial, error = %e, "device rejected");
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error
        .unwrap_or_else(|| PipelineError::configuration("no device satisfies the requests")))
}

fn resolve_on(device: &dyn Device, requests: &[StreamRequest]) -> Result<Vec<StreamProfile>> {
    if requests.is_empty() {
        let profiles: Vec<StreamProfile> = device
            .stream_keys()
            .into_iter()
            .filter_map(|key| device.default_profile(key))
            .collect();
        if profiles.is_empty() {
            return Err(PipelineError::configuration(format!(
                "device {} offers no streams",
                device.info().serial
            )));
        }
        return Ok(profiles);
    }

    let claimed: HashSet<StreamKey> = requests
        .iter()
        .filter(|r| r.index != 0)
        .map(|r| r.key())
        .collect();
    let mut taken: HashSet<StreamKey> = HashSet::new();
    let mut profiles = Vec::with_capacity(requests.len());

    // Explicit indices first, so wildcards only see what is left.
    let ordered = requests
        .iter()
        .filter(|r| r.index != 0)
        .chain(requests.iter().filter(|r| r.index == 0));

    for request in ordered {
        let profile = select_profile(device, request, &claimed, &taken)?;
        taken.insert(profile.key());
        profiles.push(profile);
    }

    profiles.sort_by_key(|p| p.key());
    Ok(profiles)
}

fn select_profile(
    device: &dyn Device,
    request: &StreamRequest,
    claimed: &HashSet<StreamKey>,
    taken: &HashSet<StreamKey>,
) -> Result<StreamProfile> {
    let indices: Vec<u32> = if request.index != 0 {
        vec![request.index]
    } else {
        device
            .stream_keys()
            .into_iter()
            .filter(|key| key.0 == request.kind && !claimed.contains(key) && !taken.contains(key))
            .map(|(_, index)| index)
            .collect()
    };

    let offered = device.stream_profiles();
    for index in indices {
        let Some(default) = device.default_profile((request.kind, index)) else {
            continue;
        };

        // Strictly greater keeps the earliest listed profile on ties.
        let mut best: Option<(usize, StreamProfile)> = None;
        for profile in offered
            .iter()
            .filter(|p| p.key() == (request.kind, index) && request.matches(p))
        {
            let score = default_agreement(request, &default, profile);
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, *profile));
            }
        }

        if let Some((_, profile)) = best {
            return Ok(profile);
        }
    }

    Err(PipelineError::configuration(format!(
        "device {} has no profile satisfying {request}",
        device.info().serial
    )))
}

/// Unconstrained fields on which `profile` agrees with the stream default
fn default_agreement(
    request: &StreamRequest,
    default: &StreamProfile,
    profile: &StreamProfile,
) -> usize {
    [
        request.width == 0 && profile.width == default.width,
        request.height == 0 && profile.height == default.height,
        request.format == Format::Any && profile.format == default.format,
        request.fps == 0 && profile.fps == default.fps,
    ]
    .into_iter()
    .filter(|agrees| *agrees)
    .count()
}
