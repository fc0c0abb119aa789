// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Rules that keep the editable params of a sample consistent.
//!
//! Every edit is applied to the params in place and the result always satisfies
//! `min_vol <= current_vol <= max_vol` and, for timeframe edits,
//! `max_timeframe_length_ms - min_timeframe_length_ms >= MIN_TIMEFRAME_MARGIN_MS`.
//! Violations are corrected by clamping, never reported.

use crate::config::SubsceneSampleParams;

/// Smallest gap kept between the min and max timeframe when either is edited.
pub const MIN_TIMEFRAME_MARGIN_MS: u64 = 2000;

/// Volumes are expressed as 0-100.
pub const MAX_VOLUME: f32 = 100.0;

fn clamp_volume(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, MAX_VOLUME)
}

/// Brings params loaded from a catalog into a consistent state. Timeframes are
/// left as written.
pub fn normalize(params: &mut SubsceneSampleParams) {
    params.min_vol = clamp_volume(params.min_vol);
    params.max_vol = clamp_volume(params.max_vol);
    if params.min_vol > params.max_vol {
        params.min_vol = params.max_vol;
    }
    params.current_vol = clamp_volume(params.current_vol).max(params.min_vol).min(params.max_vol);
}

/// Sets the current volume, clamped into the min/max bounds. Returns the accepted value.
pub fn set_current_volume(params: &mut SubsceneSampleParams, value: f32) -> f32 {
    params.current_vol = clamp_volume(value).max(params.min_vol).min(params.max_vol);
    params.current_vol
}

/// Sets the min volume. It collapses onto the max rather than crossing it and
/// drags the current volume up with it. Returns the resulting current volume.
pub fn set_min_volume(params: &mut SubsceneSampleParams, value: f32) -> f32 {
    params.min_vol = clamp_volume(value).min(params.max_vol);
    if params.min_vol > params.current_vol {
        params.current_vol = params.min_vol;
    }
    params.current_vol
}

/// Sets the max volume. It collapses onto the min rather than crossing it and
/// drags the current volume down with it. Returns the resulting current volume.
pub fn set_max_volume(params: &mut SubsceneSampleParams, value: f32) -> f32 {
    params.max_vol = clamp_volume(value).max(params.min_vol);
    if params.max_vol < params.current_vol {
        params.current_vol = params.max_vol;
    }
    params.current_vol
}

/// Sets the min timeframe, kept at least the margin below the max. Returns the stored value.
pub fn set_min_timeframe(params: &mut SubsceneSampleParams, value_ms: u64) -> u64 {
    let ceiling = params
        .max_timeframe_length_ms
        .saturating_sub(MIN_TIMEFRAME_MARGIN_MS);
    params.min_timeframe_length_ms = value_ms.min(ceiling);
    // A max below the margin cannot be satisfied by moving the min alone.
    if params.max_timeframe_length_ms < params.min_timeframe_length_ms + MIN_TIMEFRAME_MARGIN_MS {
        params.max_timeframe_length_ms = params.min_timeframe_length_ms + MIN_TIMEFRAME_MARGIN_MS;
    }
    params.min_timeframe_length_ms
}

/// Sets the max timeframe, kept at least the margin above the min. Returns the stored value.
pub fn set_max_timeframe(params: &mut SubsceneSampleParams, value_ms: u64) -> u64 {
    params.max_timeframe_length_ms =
        value_ms.max(params.min_timeframe_length_ms.saturating_add(MIN_TIMEFRAME_MARGIN_MS));
    params.max_timeframe_length_ms
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn params() -> SubsceneSampleParams {
        SubsceneSampleParams::new(50.0, 20.0, 80.0, 2000, 8000)
    }

    fn assert_volume_invariant(params: &SubsceneSampleParams) {
        assert!(
            params.min_vol <= params.current_vol && params.current_vol <= params.max_vol,
            "volume bounds violated: {:?}",
            params
        );
    }

    #[test]
    fn test_current_volume_is_clamped() {
        let mut params = params();
        assert_eq!(set_current_volume(&mut params, 95.0), 80.0);
        assert_eq!(set_current_volume(&mut params, 5.0), 20.0);
        assert_eq!(set_current_volume(&mut params, 42.5), 42.5);
    }

    #[test]
    fn test_min_volume_collapses_onto_max() {
        let mut params = params();
        set_min_volume(&mut params, 90.0);
        assert_eq!(params.min_vol, 80.0);
        assert_eq!(params.max_vol, 80.0);
        assert_eq!(params.current_vol, 80.0);
    }

    #[test]
    fn test_min_volume_raises_current() {
        let mut params = params();
        assert_eq!(set_min_volume(&mut params, 60.0), 60.0);
        assert_eq!(params.current_vol, 60.0);

        // Lowering the min leaves the current volume alone.
        assert_eq!(set_min_volume(&mut params, 10.0), 60.0);
    }

    #[test]
    fn test_max_volume_lowers_current() {
        let mut params = params();
        assert_eq!(set_max_volume(&mut params, 30.0), 30.0);
        assert_eq!(params.max_vol, 30.0);

        set_max_volume(&mut params, 5.0);
        assert_eq!(params.max_vol, 20.0);
        assert_eq!(params.min_vol, 20.0);
        assert_eq!(params.current_vol, 20.0);
    }

    #[test]
    fn test_volumes_stay_in_range() {
        let mut params = params();
        set_max_volume(&mut params, 250.0);
        assert_eq!(params.max_vol, 100.0);
        set_min_volume(&mut params, -10.0);
        assert_eq!(params.min_vol, 0.0);
        set_current_volume(&mut params, f32::NAN);
        assert_eq!(params.current_vol, 0.0);
    }

    #[test]
    fn test_min_timeframe_keeps_margin() {
        let mut params = params();
        assert_eq!(set_min_timeframe(&mut params, 7000), 6000);
        assert_eq!(params.max_timeframe_length_ms, 8000);
        assert_eq!(set_min_timeframe(&mut params, 3000), 3000);
    }

    #[test]
    fn test_min_timeframe_with_tiny_max() {
        let mut params = SubsceneSampleParams::new(50.0, 0.0, 100.0, 500, 1000);
        assert_eq!(set_min_timeframe(&mut params, 800), 0);
        assert_eq!(params.max_timeframe_length_ms, MIN_TIMEFRAME_MARGIN_MS);
    }

    #[test]
    fn test_max_timeframe_keeps_margin() {
        let mut params = params();
        assert_eq!(set_max_timeframe(&mut params, 3000), 4000);
        assert_eq!(set_max_timeframe(&mut params, 12000), 12000);
    }

    #[test]
    fn test_normalize() {
        let mut params = SubsceneSampleParams::new(120.0, 90.0, 60.0, 2000, 2500);
        normalize(&mut params);
        assert_eq!(params.min_vol, 60.0);
        assert_eq!(params.max_vol, 60.0);
        assert_eq!(params.current_vol, 60.0);
        assert_eq!(params.max_timeframe_length_ms, 2500);
    }

    #[test]
    fn test_random_edits_hold_invariants() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut params = params();
        for _ in 0..10_000 {
            match rng.gen_range(0..5) {
                0 => {
                    set_current_volume(&mut params, rng.gen_range(-20.0..=120.0));
                }
                1 => {
                    set_min_volume(&mut params, rng.gen_range(-20.0..=120.0));
                }
                2 => {
                    set_max_volume(&mut params, rng.gen_range(-20.0..=120.0));
                }
                3 => {
                    set_min_timeframe(&mut params, rng.gen_range(0..=20_000));
                }
                _ => {
                    set_max_timeframe(&mut params, rng.gen_range(0..=20_000));
                }
            }
            assert_volume_invariant(&params);
            assert!((0.0..=MAX_VOLUME).contains(&params.min_vol));
            assert!((0.0..=MAX_VOLUME).contains(&params.max_vol));
        }
    }

    #[test]
    fn test_timeframe_edits_keep_margin() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut params = params();
        for _ in 0..10_000 {
            if rng.gen_bool(0.5) {
                set_min_timeframe(&mut params, rng.gen_range(0..=20_000));
            } else {
                set_max_timeframe(&mut params, rng.gen_range(0..=20_000));
            }
            assert!(
                params.max_timeframe_length_ms - params.min_timeframe_length_ms
                    >= MIN_TIMEFRAME_MARGIN_MS
            );
        }
    }
}
