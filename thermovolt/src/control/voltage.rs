/// Round `microvolts` to the nearest multiple of `step_uv`, halves rounding up.
///
/// Integer-only so repeated application is exact: quantizing an already
/// quantized value returns it unchanged.
pub fn quantize(microvolts: i64, step_uv: i64) -> i64 {
    (microvolts + step_uv / 2).div_euclid(step_uv) * step_uv
}

/// Nearest step within `[min_uv, max_uv]`.
///
/// Quantizing a clamped value can land one step outside a bound that is not
/// itself on the grid; such results are pulled back to the closest in-range
/// step. At least one step must lie inside the bounds.
pub fn quantize_within(microvolts: i64, step_uv: i64, min_uv: i64, max_uv: i64) -> i64 {
    let quantized = quantize(microvolts, step_uv);
    if quantized > max_uv {
        max_uv.div_euclid(step_uv) * step_uv
    } else if quantized < min_uv {
        -(-min_uv).div_euclid(step_uv) * step_uv
    } else {
        quantized
    }
}

/// Result of one proportional update for a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoltageUpdate {
    pub error_c: i64,
    pub delta_uv: i64,
    /// Clamped to the device bounds but not quantized. Carried into the
    /// next tick so sub-step progress is not lost.
    pub voltage_uv: i64,
}

#[derive(Debug, Clone)]
pub struct ProportionalController {
    /// Voltage steps per °C of error.
    pub proportional_gain: f64,
    pub step_uv: i64,
}

impl ProportionalController {
    pub fn new(proportional_gain: f64, step_uv: i64) -> Self {
        Self {
            proportional_gain,
            step_uv,
        }
    }

    /// Voltage change for a temperature error, rounded once to whole µV.
    ///
    /// A positive error (device cooler than target) raises the voltage.
    /// Saturates at the `i64` range.
    pub fn delta(&self, error_c: i64) -> i64 {
        let raw = error_c as f64 * self.proportional_gain * self.step_uv as f64;
        (raw + 0.5).floor() as i64
    }

    pub fn update(
        &self,
        current_uv: i64,
        target_c: i32,
        temperature_c: i32,
        min_uv: i64,
        max_uv: i64,
    ) -> VoltageUpdate {
        let error_c = i64::from(target_c) - i64::from(temperature_c);
        let delta_uv = self.delta(error_c);
        let voltage_uv = current_uv
            .saturating_add(delta_uv)
            .max(min_uv)
            .min(max_uv);

        VoltageUpdate {
            error_c,
            delta_uv,
            voltage_uv,
        }
    }

    pub fn quantize(&self, microvolts: i64) -> i64 {
        quantize(microvolts, self.step_uv)
    }

    pub fn quantize_within(&self, microvolts: i64, min_uv: i64, max_uv: i64) -> i64 {
        quantize_within(microvolts, self.step_uv, min_uv, max_uv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const STEP: i64 = 6250;

    #[test_case(850_000, 850_000 ; "already on grid")]
    #[test_case(855_625, 856_250 ; "rounds up past half")]
    #[test_case(853_124, 850_000 ; "rounds down below half")]
    #[test_case(853_125, 856_250 ; "half rounds up")]
    #[test_case(762_000, 762_500 ; "odd bound")]
    #[test_case(0, 0 ; "zero")]
    fn should_quantize_to_step_grid(input: i64, expected: i64) {
        assert_eq!(quantize(input, STEP), expected);
    }

    #[test]
    fn quantize_is_idempotent() {
        for microvolts in (700_000..900_000).step_by(113) {
            let once = quantize(microvolts, STEP);
            assert_eq!(quantize(once, STEP), once, "input {microvolts}");
            assert_eq!(once % STEP, 0);
        }
    }

    #[test_case(880_000, 875_000 ; "bound above grid point pulls down")]
    #[test_case(878_000, 875_000 ; "near upper bound")]
    #[test_case(743_000, 743_750 ; "bound below grid point pulls up")]
    #[test_case(800_000, 800_000 ; "inside bounds untouched")]
    fn should_quantize_within_bounds(input: i64, expected: i64) {
        assert_eq!(quantize_within(input, STEP, 743_000, 880_000), expected);
    }

    #[test]
    fn quantize_within_is_idempotent_and_bounded() {
        for microvolts in (743_000..=880_000).step_by(97) {
            let once = quantize_within(microvolts, STEP, 743_000, 880_000);
            assert_eq!(quantize_within(once, STEP, 743_000, 880_000), once);
            assert!((743_000..=880_000).contains(&once), "input {microvolts}");
        }
    }

    #[test]
    fn should_compute_reference_scenario() {
        let controller = ProportionalController::new(0.3, STEP);

        let update = controller.update(850_000, 63, 60, 762_000, 880_000);

        assert_eq!(update.error_c, 3);
        assert_eq!(update.delta_uv, 5625);
        assert_eq!(update.voltage_uv, 855_625);
        assert_eq!(controller.quantize(update.voltage_uv), 856_250);
    }

    #[test]
    fn should_lower_voltage_when_hotter_than_target() {
        let controller = ProportionalController::new(0.3, STEP);

        let update = controller.update(850_000, 63, 67, 762_000, 880_000);

        assert_eq!(update.error_c, -4);
        assert_eq!(update.delta_uv, -7500);
        assert_eq!(update.voltage_uv, 842_500);
    }

    #[test]
    fn should_clamp_to_bounds() {
        let controller = ProportionalController::new(0.3, STEP);

        let high = controller.update(878_000, 63, 40, 762_000, 880_000);
        assert_eq!(high.voltage_uv, 880_000);

        let low = controller.update(765_000, 63, 79, 762_000, 880_000);
        assert_eq!(low.voltage_uv, 762_000);
    }

    #[test]
    fn should_saturate_on_extreme_readings() {
        let controller = ProportionalController::new(0.3, STEP);

        let frozen = controller.update(850_000, 63, i32::MIN, 762_000, 880_000);
        assert_eq!(frozen.error_c, 63 - i64::from(i32::MIN));
        assert_eq!(frozen.voltage_uv, 880_000);

        let melting = controller.update(850_000, i32::MIN, i32::MAX, 762_000, 880_000);
        assert_eq!(melting.voltage_uv, 762_000);
    }

    #[test]
    fn should_saturate_with_huge_gain() {
        let controller = ProportionalController::new(1e15, STEP);

        let cold = controller.update(850_000, 63, 20, 762_000, 880_000);
        assert_eq!(cold.delta_uv, i64::MAX);
        assert_eq!(cold.voltage_uv, 880_000);

        let hot = controller.update(850_000, 63, 79, 762_000, 880_000);
        assert_eq!(hot.voltage_uv, 762_000);
    }

    #[test]
    fn should_not_change_voltage_at_target() {
        let controller = ProportionalController::new(0.3, STEP);

        let update = controller.update(850_000, 63, 63, 762_000, 880_000);

        assert_eq!(update.delta_uv, 0);
        assert_eq!(update.voltage_uv, 850_000);
    }
}
