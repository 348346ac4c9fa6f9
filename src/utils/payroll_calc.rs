//! Monthly salary computation. All figures are rounded to 2 decimals.

use crate::model::salary::SalaryStructure;

pub const PF_RATE: f64 = 0.12;
/// Statutory wage ceiling for provident fund.
pub const PF_WAGE_CEILING: f64 = 15_000.0;
pub const ESI_RATE: f64 = 0.0075;
pub const ESI_GROSS_LIMIT: f64 = 21_000.0;
pub const STANDARD_DEDUCTION: f64 = 50_000.0;

/// (upper bound of slab, rate); the last slab is open-ended.
const TAX_SLABS: [(f64, f64); 6] = [
    (300_000.0, 0.0),
    (600_000.0, 0.05),
    (900_000.0, 0.10),
    (1_200_000.0, 0.15),
    (1_500_000.0, 0.20),
    (f64::INFINITY, 0.30),
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PayInputs {
    pub working_days: f64,
    pub unpaid_leave_days: f64,
    pub absent_days: f64,
    pub bonus: f64,
    pub other_deductions: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PayBreakdown {
    pub working_days: f64,
    pub payable_days: f64,
    pub basic: f64,
    pub hra: f64,
    pub special_allowance: f64,
    pub other_allowance: f64,
    pub bonus: f64,
    pub gross: f64,
    pub pf: f64,
    pub esi: f64,
    pub professional_tax: f64,
    pub tds: f64,
    pub other_deductions: f64,
    pub total_deductions: f64,
    pub net_salary: f64,
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn payable_days(inputs: &PayInputs) -> f64 {
    (inputs.working_days - inputs.unpaid_leave_days - inputs.absent_days).max(0.0)
}

/// Employee PF: 12% of earned basic, on at most the wage ceiling when the
/// contracted basic is above it.
pub fn provident_fund(structure_basic: f64, earned_basic: f64) -> f64 {
    if structure_basic <= PF_WAGE_CEILING {
        round2(earned_basic * PF_RATE)
    } else {
        round2(PF_WAGE_CEILING * PF_RATE)
    }
}

pub fn esi(gross: f64) -> f64 {
    if gross <= ESI_GROSS_LIMIT {
        round2(gross * ESI_RATE)
    } else {
        0.0
    }
}

pub fn professional_tax(gross: f64) -> f64 {
    if gross > 15_000.0 {
        200.0
    } else if gross > 10_000.0 {
        150.0
    } else {
        0.0
    }
}

pub fn annual_income_tax(taxable: f64) -> f64 {
    let mut tax = 0.0;
    let mut lower = 0.0;
    for (upper, rate) in TAX_SLABS {
        if taxable <= lower {
            break;
        }
        tax += (taxable.min(upper) - lower) * rate;
        lower = upper;
    }
    tax
}

/// Monthly TDS on the annualised gross.
pub fn monthly_tds(gross: f64) -> f64 {
    let taxable = (gross * 12.0 - STANDARD_DEDUCTION).max(0.0);
    round2(annual_income_tax(taxable) / 12.0)
}

pub fn compute(structure: &SalaryStructure, inputs: &PayInputs) -> PayBreakdown {
    let payable = payable_days(inputs);
    let factor = if inputs.working_days > 0.0 {
        payable / inputs.working_days
    } else {
        0.0
    };

    let basic = round2(structure.basic * factor);
    let hra = round2(structure.hra * factor);
    let special_allowance = round2(structure.special_allowance * factor);
    let other_allowance = round2(structure.other_allowance * factor);
    let bonus = round2(inputs.bonus.max(0.0));
    let gross = round2(basic + hra + special_allowance + other_allowance + bonus);

    let pf = provident_fund(structure.basic, basic);
    let esi = esi(gross);
    let professional_tax = professional_tax(gross);
    let tds = monthly_tds(gross);
    let other_deductions = round2(inputs.other_deductions.max(0.0));
    let total_deductions = round2(pf + esi + professional_tax + tds + other_deductions);

    PayBreakdown {
        working_days: inputs.working_days,
        payable_days: payable,
        basic,
        hra,
        special_allowance,
        other_allowance,
        bonus,
        gross,
        pf,
        esi,
        professional_tax,
        tds,
        other_deductions,
        total_deductions,
        net_salary: round2(gross - total_deductions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structure(basic: f64, hra: f64, special: f64, other: f64) -> SalaryStructure {
        SalaryStructure {
            employee_id: 1,
            basic,
            hra,
            special_allowance: special,
            other_allowance: other,
        }
    }

    fn full_month() -> PayInputs {
        PayInputs {
            working_days: 22.0,
            ..Default::default()
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn pf_is_twelve_percent_up_to_the_ceiling() {
        assert_eq!(provident_fund(15_000.0, 15_000.0), 1_800.0);
        assert_eq!(provident_fund(12_000.0, 12_000.0), 1_440.0);
        // Above the ceiling the contribution is flat.
        assert_eq!(provident_fund(40_000.0, 40_000.0), 1_800.0);
    }

    #[test]
    fn esi_applies_only_to_low_gross() {
        assert_eq!(esi(20_000.0), 150.0);
        assert_eq!(esi(21_000.0), 157.5);
        assert_eq!(esi(21_000.01), 0.0);
    }

    #[test]
    fn professional_tax_slabs() {
        assert_eq!(professional_tax(9_000.0), 0.0);
        assert_eq!(professional_tax(12_000.0), 150.0);
        assert_eq!(professional_tax(15_000.01), 200.0);
    }

    #[test]
    fn income_tax_slabs_are_progressive() {
        assert_eq!(annual_income_tax(250_000.0), 0.0);
        assert!(close(annual_income_tax(600_000.0), 15_000.0));
        // 15k + 30k + 45k + 60k + 30% of 500k
        assert!(close(annual_income_tax(2_000_000.0), 300_000.0));
    }

    #[test]
    fn low_salary_full_month() {
        let pay = compute(&structure(10_000.0, 4_000.0, 1_000.0, 0.0), &full_month());

        assert_eq!(pay.gross, 15_000.0);
        assert_eq!(pay.pf, 1_200.0);
        assert_eq!(pay.esi, 112.5);
        assert_eq!(pay.professional_tax, 150.0);
        assert_eq!(pay.tds, 0.0);
        assert!(close(pay.net_salary, 13_537.5));
    }

    #[test]
    fn unpaid_days_prorate_earnings() {
        let inputs = PayInputs {
            working_days: 20.0,
            unpaid_leave_days: 2.0,
            absent_days: 3.0,
            ..Default::default()
        };
        let pay = compute(&structure(20_000.0, 8_000.0, 0.0, 0.0), &inputs);

        assert_eq!(pay.payable_days, 15.0);
        assert_eq!(pay.basic, 15_000.0);
        assert_eq!(pay.hra, 6_000.0);
        // contracted basic above the ceiling → flat PF
        assert_eq!(pay.pf, 1_800.0);
    }

    #[test]
    fn high_salary_pays_tds_and_bonus_counts_towards_gross() {
        let inputs = PayInputs {
            bonus: 10_000.0,
            other_deductions: 500.0,
            ..full_month()
        };
        let pay = compute(&structure(60_000.0, 30_000.0, 10_000.0, 0.0), &inputs);

        assert_eq!(pay.gross, 110_000.0);
        assert_eq!(pay.esi, 0.0);
        assert!(pay.tds > 0.0);
        assert!(close(
            pay.net_salary,
            pay.gross - pay.pf - pay.professional_tax - pay.tds - 500.0
        ));
    }

    #[test]
    fn zero_working_days_pays_nothing_but_bonus() {
        let inputs = PayInputs {
            working_days: 0.0,
            bonus: 1_000.0,
            ..Default::default()
        };
        let pay = compute(&structure(10_000.0, 0.0, 0.0, 0.0), &inputs);
        assert_eq!(pay.basic, 0.0);
        assert_eq!(pay.gross, 1_000.0);
    }
}
