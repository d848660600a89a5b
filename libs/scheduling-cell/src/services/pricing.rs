// libs/scheduling-cell/src/services/pricing.rs
use chrono::NaiveTime;
use tracing::{debug, info};

use crate::error::SchedulingError;
use crate::models::{
    minute_of_day, minutes_i32, time_from_minute, AppointmentService, AppointmentTotals,
    ServiceInfo,
};

const BPS_DENOMINATOR: i64 = 10_000;

/// Largest quantity of one service on a single appointment.
pub const MAX_SERVICE_QUANTITY: u32 = 20;

/// Largest accepted tip, in minor units.
pub const MAX_TIP: i64 = 1_000_000;

fn amount_overflow(what: &str) -> SchedulingError {
    SchedulingError::Validation(format!("{} is out of range", what))
}

pub struct PricingService {
    tax_rate_bps: u32,
}

impl PricingService {
    pub fn new(tax_rate_bps: u32) -> Self {
        Self { tax_rate_bps }
    }

    /// Lay the selected services out back to back from `start_time`.
    pub fn build_service_lines(
        &self,
        start_time: NaiveTime,
        selections: &[(ServiceInfo, u32)],
    ) -> Result<Vec<AppointmentService>, SchedulingError> {
        if selections.is_empty() {
            return Err(SchedulingError::Validation(
                "at least one service is required".to_string(),
            ));
        }

        let mut cursor = minute_of_day(start_time);
        let mut lines = Vec::with_capacity(selections.len());

        for (order, (service, quantity)) in selections.iter().enumerate() {
            if *quantity == 0 || *quantity > MAX_SERVICE_QUANTITY {
                return Err(SchedulingError::Validation(format!(
                    "quantity for service {} must be between 1 and {}",
                    service.name, MAX_SERVICE_QUANTITY
                )));
            }
            let line_end = service
                .duration_minutes
                .checked_mul(*quantity)
                .and_then(|minutes| cursor.checked_add(minutes_i32(minutes)));
            let (Some(line_start), Some(end_minute), Some(line_end)) = (
                time_from_minute(cursor),
                line_end,
                line_end.and_then(time_from_minute),
            ) else {
                return Err(SchedulingError::Validation(format!(
                    "service {} would run past the end of the day",
                    service.name
                )));
            };

            lines.push(AppointmentService {
                service_id: service.id,
                name: service.name.clone(),
                duration_minutes: service.duration_minutes,
                unit_price: service.price,
                quantity: *quantity,
                order: order as u32,
                start_time: line_start,
                end_time: line_end,
            });
            cursor = end_minute;
        }

        debug!("Built {} service lines ending at minute {}", lines.len(), cursor);
        Ok(lines)
    }

    /// Totals for a new appointment. Tax applies after discount.
    pub fn quote(
        &self,
        lines: &[AppointmentService],
        discount: i64,
    ) -> Result<AppointmentTotals, SchedulingError> {
        let subtotal = lines
            .iter()
            .try_fold(0i64, |total, line| {
                line.unit_price
                    .checked_mul(i64::from(line.quantity))
                    .and_then(|amount| total.checked_add(amount))
            })
            .ok_or_else(|| amount_overflow("subtotal"))?;

        if discount < 0 || discount > subtotal {
            return Err(SchedulingError::Validation(format!(
                "discount {} must be between 0 and the subtotal {}",
                discount, subtotal
            )));
        }

        let taxable = subtotal - discount;
        let tax = self.calculate_tax(taxable)?;
        let total = taxable
            .checked_add(tax)
            .ok_or_else(|| amount_overflow("total"))?;
        Ok(AppointmentTotals {
            subtotal,
            discount,
            tax,
            tip: 0,
            total,
            finalized: false,
        })
    }

    /// Add the tip and lock the totals when service is completed.
    pub fn finalize(
        &self,
        totals: &AppointmentTotals,
        tip: i64,
    ) -> Result<AppointmentTotals, SchedulingError> {
        if tip < 0 {
            return Err(SchedulingError::Validation(
                "tip cannot be negative".to_string(),
            ));
        }
        if tip > MAX_TIP {
            return Err(SchedulingError::Validation(format!(
                "tip {} exceeds the maximum of {}",
                tip, MAX_TIP
            )));
        }

        let total = totals
            .subtotal
            .checked_sub(totals.discount)
            .and_then(|amount| amount.checked_add(totals.tax))
            .and_then(|amount| amount.checked_add(tip))
            .ok_or_else(|| amount_overflow("total"))?;
        info!("Finalized appointment total: {} (tip {})", total, tip);

        Ok(AppointmentTotals {
            tip,
            total,
            finalized: true,
            ..*totals
        })
    }

    /// Basis-point tax, rounded half up.
    fn calculate_tax(&self, taxable: i64) -> Result<i64, SchedulingError> {
        taxable
            .checked_mul(i64::from(self.tax_rate_bps))
            .and_then(|scaled| scaled.checked_add(BPS_DENOMINATOR / 2))
            .map(|scaled| scaled / BPS_DENOMINATOR)
            .ok_or_else(|| amount_overflow("tax"))
    }
}
