//! Update resolution: given a deployment's package history and a client's
//! request, compute the decision to cache and serve. Pure functions of
//! their inputs; the pipeline owns all I/O.

use semver::Version;
use storage::Package;

use crate::errors::AcquisitionError;
use crate::types::{UpdateCheckCacheResponse, UpdateCheckRequest, UpdateInfo};
use crate::version::{self, NormalizedAppVersion};

/// Normalizes the request version, resolves both rollout branches, and
/// rewrites the response version back to the client's original string when
/// a coercion occurred.
pub fn resolve(
    history: &[Package],
    request: &UpdateCheckRequest,
) -> Result<UpdateCheckCacheResponse, AcquisitionError> {
    let NormalizedAppVersion {
        normalized,
        original,
    } = version::normalize(&request.app_version);

    let request_version = Version::parse(&normalized).map_err(|_| {
        AcquisitionError::MalformedRequest(
            "An update check must include a binary version that conforms to the semver standard \
             (e.g. '1.0.0'). The binary version is normally inferred from the App Store/Play \
             Store version configured with your app."
                .to_string(),
        )
    })?;

    let mut normalized_request = request.clone();
    normalized_request.app_version = normalized.clone();
    let mut decision = get_update_package_info(history, &normalized_request, &request_version);

    // Clients should see the version string they sent, not the coerced one.
    if let Some(raw) = original {
        if decision.original_package.app_version == normalized {
            decision.original_package.app_version = raw.clone();
        }
        if let Some(rollout_package) = decision.rollout_package.as_mut()
            && rollout_package.app_version == normalized
        {
            rollout_package.app_version = raw;
        }
    }

    Ok(decision)
}

/// Computes both branches of the decision: the package an unrestricted
/// client receives, plus, when the winning candidate is mid-rollout, the
/// package clients outside the cohort keep receiving.
fn get_update_package_info(
    history: &[Package],
    request: &UpdateCheckRequest,
    request_version: &Version,
) -> UpdateCheckCacheResponse {
    let (update, rollout) = get_update_package(history, request, request_version, false);

    match rollout {
        Some(percentage) if percentage > 0 && percentage < 100 => {
            // Non-selected clients get the decision recomputed as if the
            // mid-rollout releases did not exist.
            let (original, _) = get_update_package(history, request, request_version, true);
            UpdateCheckCacheResponse {
                original_package: original,
                rollout: Some(percentage),
                rollout_package: Some(update),
            }
        }
        _ => UpdateCheckCacheResponse {
            original_package: update,
            rollout: None,
            rollout_package: None,
        },
    }
}

fn get_update_package(
    history: &[Package],
    request: &UpdateCheckRequest,
    request_version: &Version,
    ignore_rollout_packages: bool,
) -> (UpdateInfo, Option<u32>) {
    let mut update = UpdateInfo::default();

    if history.is_empty() {
        update.should_run_binary_version = true;
        return (update, None);
    }

    let mut found_request_package_in_history = false;
    let mut latest_enabled: Option<&Package> = None;
    let mut latest_satisfying_enabled: Option<&Package> = None;
    let mut should_make_update_mandatory = false;

    for entry in history.iter().rev() {
        // Is this the release the client is currently running? A reported
        // label wins over a reported hash; a client reporting neither is
        // still on the binary and matches nothing, so the walk covers the
        // whole history.
        found_request_package_in_history = found_request_package_in_history
            || match (&request.label, &request.package_hash) {
                (None, None) => false,
                (Some(label), _) => entry.label.as_deref() == Some(label.as_str()),
                (None, Some(hash)) => entry.package_hash == *hash,
            };

        if entry.is_disabled || (ignore_rollout_packages && entry.is_unfinished_rollout()) {
            continue;
        }

        latest_enabled = latest_enabled.or(Some(entry));
        if !request.is_companion && !version::satisfies(request_version, &entry.app_version) {
            continue;
        }

        if latest_satisfying_enabled.is_none() {
            latest_satisfying_enabled = Some(entry);
        }

        if found_request_package_in_history {
            // Nothing older than the client's current release is relevant.
            break;
        } else if entry.is_mandatory {
            // A mandatory release between the client's current one and the
            // target makes the offered update mandatory.
            should_make_update_mandatory = true;
        }
    }

    let Some(latest_enabled) = latest_enabled else {
        update.should_run_binary_version = true;
        return (update, None);
    };

    let candidate = match latest_satisfying_enabled {
        // Nothing in history targets this binary.
        None => {
            update.should_run_binary_version = true;
            return (
                no_update_response(update, request, request_version, latest_enabled),
                None,
            );
        }
        // Already running the newest eligible release.
        Some(candidate)
            if request.package_hash.as_deref() == Some(candidate.package_hash.as_str()) =>
        {
            return (
                no_update_response(update, request, request_version, latest_enabled),
                None,
            );
        }
        Some(candidate) => candidate,
    };

    update.download_url = candidate.blob_url.clone();
    update.package_size = candidate.size;
    update.description = candidate.description.clone();
    update.is_available = true;
    update.is_mandatory = should_make_update_mandatory || candidate.is_mandatory;
    update.app_version = request.app_version.clone();
    update.label = candidate.label.clone().unwrap_or_default();
    update.package_hash = candidate.package_hash.clone();

    (update, candidate.rollout)
}

/// Fills in the version fields of a no-update answer: echo the client's
/// version when its binary is already past everything we could serve, or
/// direct it to the newest targetable binary otherwise.
fn no_update_response(
    mut update: UpdateInfo,
    request: &UpdateCheckRequest,
    request_version: &Version,
    latest_enabled: &Package,
) -> UpdateInfo {
    if is_binary_newer_than(request_version, &latest_enabled.app_version) {
        update.app_version = request.app_version.clone();
    } else if !version::satisfies(request_version, &latest_enabled.app_version) {
        update.update_app_version = true;
        update.app_version = latest_enabled.app_version.clone();
    }
    update
}

/// Whether the client's binary is newer than everything the release range
/// can target (so there is nothing to offer and nothing to upgrade to).
fn is_binary_newer_than(request_version: &Version, range: &str) -> bool {
    if let Ok(exact) = Version::parse(range) {
        return *request_version > exact;
    }
    match semver::VersionReq::parse(range) {
        Ok(req) => {
            // A conjunction of comparators is exceeded as soon as the
            // version sits above one of its upper bounds; a pure
            // lower-bound range has none and can never be exceeded.
            !req.matches(request_version)
                && req
                    .comparators
                    .iter()
                    .any(|c| above_upper_bound(request_version, c))
        }
        Err(_) => false,
    }
}

/// Whether `v` sits above the region a single comparator allows.
fn above_upper_bound(v: &Version, c: &semver::Comparator) -> bool {
    use semver::Op;

    let minor = c.minor.unwrap_or(0);
    let patch = c.patch.unwrap_or(0);

    match c.op {
        // Open above: nothing can be newer than these.
        Op::Greater | Op::GreaterEq => false,
        Op::Less => *v >= Version::new(c.major, minor, patch),
        Op::LessEq => *v > Version::new(c.major, minor, patch),
        // `1.2.3` / `1.2.x` / `1.x`: bound at the wildcard position.
        Op::Exact | Op::Wildcard => match (c.minor, c.patch) {
            (None, _) => v.major > c.major,
            (Some(mi), None) => (v.major, v.minor) > (c.major, mi),
            (Some(mi), Some(p)) => (v.major, v.minor, v.patch) > (c.major, mi, p),
        },
        Op::Tilde => match c.minor {
            None => v.major > c.major,
            Some(mi) => (v.major, v.minor) > (c.major, mi),
        },
        Op::Caret => {
            if c.major > 0 {
                v.major > c.major
            } else if minor > 0 {
                (v.major, v.minor) > (0, minor)
            } else {
                (v.major, v.minor, v.patch) > (0, minor, patch)
            }
        }
        _ => false,
    }
}
