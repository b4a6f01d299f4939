use clap::Args;
use parkwise_agent::{Agent, EligibilityAgent, PhaseFailure};
use parkwise_core::config::LoadOptions;
use parkwise_core::domain::conditions::{EligibilityConditions, SpecialCondition};
use parkwise_core::domain::responses::EligibilityRequest;
use parkwise_core::errors::DomainError;

use crate::commands::{load_config, runtime, Catalog, CommandResult, Failure};

/// Deposit parameters and optional tag filters shared by `filter` and `recommend`.
#[derive(Debug, Clone, Args)]
pub struct ConditionArgs {
    #[arg(long = "min-rate", default_value_t = 0.0, help = "Minimum base rate in percent")]
    pub min_interest_rate: f64,
    #[arg(long = "amount", help = "Deposit amount in won")]
    pub deposit_amount: u64,
    #[arg(long = "months", default_value_t = 12, help = "Deposit period in months")]
    pub deposit_months: u32,
    #[arg(long = "category", value_delimiter = ',', help = "Product categories to keep")]
    pub categories: Vec<String>,
    #[arg(
        long = "special",
        value_delimiter = ',',
        help = "Special conditions the user can meet (e.g. bank_app,first_banking)"
    )]
    pub special_conditions: Vec<String>,
    #[arg(long, help = "Use the built-in demo catalog instead of the database")]
    pub demo: bool,
}

impl ConditionArgs {
    pub fn conditions(&self) -> Result<EligibilityConditions, DomainError> {
        let special = self
            .special_conditions
            .iter()
            .map(|raw| raw.parse::<SpecialCondition>())
            .collect::<Result<Vec<_>, _>>()?;
        let conditions = EligibilityConditions::new(
            self.min_interest_rate,
            self.deposit_amount,
            self.deposit_months,
        )?
        .with_categories(self.categories.iter().cloned())
        .with_special_conditions(special);
        Ok(conditions)
    }
}

pub(crate) fn invalid_conditions(error: DomainError) -> Failure {
    ("invalid_conditions", error.to_string(), 2u8)
}

/// Runs the eligibility phase alone and prints the matched products.
pub fn run(options: LoadOptions, args: &ConditionArgs) -> CommandResult {
    let result = load_config(options).and_then(|config| {
        let conditions = args.conditions().map_err(invalid_conditions)?;
        runtime()?.block_on(async {
            let catalog = Catalog::open(&config, args.demo).await?;
            let agent = EligibilityAgent::from_config(catalog.products.clone(), &config.pipeline)
                .map_err(|error| ("config_validation", error.to_string(), 2u8));
            let outcome: Result<_, Failure> = match agent {
                Ok(agent) => agent
                    .run(EligibilityRequest::new(conditions))
                    .await
                    .map_err(|failure| ("eligibility", failure.message(), 6u8)),
                Err(failure) => Err(failure),
            };
            catalog.close().await;
            outcome
        })
    });

    match result {
        Ok(response) => {
            let message = format!(
                "{} eligible products out of {} analyzed",
                response.result_products.len(),
                response.filter_summary.total_analyzed
            );
            CommandResult::success_with("filter", message, &response)
        }
        Err(failure) => CommandResult::from_failure("filter", failure),
    }
}

#[cfg(test)]
mod tests {
    use parkwise_core::domain::conditions::SpecialCondition;

    use super::ConditionArgs;

    fn args() -> ConditionArgs {
        ConditionArgs {
            min_interest_rate: 2.5,
            deposit_amount: 5_000_000,
            deposit_months: 6,
            categories: vec![" savings ".to_string(), String::new()],
            special_conditions: vec!["bank_app".to_string(), "First_Banking".to_string()],
            demo: true,
        }
    }

    #[test]
    fn builds_conditions_from_flags() {
        let conditions = args().conditions().expect("valid flags");

        assert_eq!(conditions.deposit_amount, 5_000_000);
        assert_eq!(conditions.deposit_months, 6);
        assert_eq!(conditions.categories.iter().collect::<Vec<_>>(), vec!["savings"]);
        assert!(conditions.special_conditions.contains(&SpecialCondition::FirstBanking));
        assert!(conditions.special_conditions.contains(&SpecialCondition::BankApp));
    }

    #[test]
    fn rejects_unknown_special_condition() {
        let mut args = args();
        args.special_conditions.push("lottery".to_string());

        let error = args.conditions().expect_err("unknown condition");
        assert!(error.to_string().contains("unknown special condition `lottery`"));
    }

    #[test]
    fn rejects_zero_deposit() {
        let mut args = args();
        args.deposit_amount = 0;

        let error = args.conditions().expect_err("zero deposit");
        assert!(error.to_string().contains("deposit_amount must be greater than zero"));
    }
}
