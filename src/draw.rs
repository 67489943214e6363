// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The random point-box reward draw.
//!
//! Rewards come from a fixed discrete distribution: a uniform roll in
//! `[0, 1)` selects the first bucket whose cumulative weight exceeds it.

/// Reward values, smallest to largest.
pub const POINT_VALUES: [i64; 8] = [10, 20, 40, 75, 100, 250, 500, 1000];

/// Cumulative weights per bucket; individual weights are
/// `{0.425, 0.2, 0.15, 0.1, 0.05, 0.0375, 0.025, 0.0125}`.
pub const CUMULATIVE_WEIGHTS: [f64; 8] =
    [0.425, 0.625, 0.775, 0.875, 0.925, 0.9625, 0.9875, 1.0];

/// Selects the reward for a uniform roll in `[0, 1)`.
pub fn pick(roll: f64) -> i64 {
    debug_assert!((0.0..1.0).contains(&roll), "roll out of range: {roll}");
    for (i, boundary) in CUMULATIVE_WEIGHTS.iter().enumerate() {
        if roll < *boundary {
            return POINT_VALUES[i];
        }
    }
    // Unreachable for rolls in [0, 1); the last boundary is 1.0.
    POINT_VALUES[POINT_VALUES.len() - 1]
}

/// Seam for the uniform random roll, so tests can fix the outcome.
pub trait RandomSource: Send + Sync {
    /// Returns a uniform value in `[0, 1)`.
    fn roll(&self) -> f64;
}

/// Production source backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn roll(&self) -> f64 {
        rand::random::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_bucket_at_zero() {
        assert_eq!(pick(0.0), 10);
    }

    #[test]
    fn boundary_rolls_fall_into_next_bucket() {
        // Boundaries are exclusive on the left: a roll equal to a
        // cumulative weight belongs to the following bucket.
        assert_eq!(pick(0.425), 20);
        assert_eq!(pick(0.625), 40);
        assert_eq!(pick(0.9875), 1000);
    }

    #[test]
    fn midpoint_roll_selects_second_bucket() {
        // 0.425 <= 0.5 < 0.625
        assert_eq!(pick(0.5), 20);
    }

    #[test]
    fn near_one_selects_largest_reward() {
        assert_eq!(pick(0.9999999), 1000);
    }

    #[test]
    fn every_roll_yields_a_table_value() {
        let mut roll = 0.0;
        while roll < 1.0 {
            assert!(POINT_VALUES.contains(&pick(roll)));
            roll += 0.001;
        }
    }

    #[test]
    fn cumulative_weights_are_increasing_to_one() {
        for pair in CUMULATIVE_WEIGHTS.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(CUMULATIVE_WEIGHTS[CUMULATIVE_WEIGHTS.len() - 1], 1.0);
    }

    #[test]
    fn thread_rng_source_stays_in_unit_interval() {
        let source = ThreadRngSource;
        for _ in 0..1000 {
            let roll = source.roll();
            assert!((0.0..1.0).contains(&roll));
        }
    }
}
