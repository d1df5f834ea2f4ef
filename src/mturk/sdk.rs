// `Marketplace` backed by the AWS SDK. The SDK is async; the CLI is not,
// so the client owns a current-thread runtime and blocks on every call.

use super::{
    Comparator, GuardedAction, HitRequest, HitSummary, Marketplace, MarketplaceError, Page,
    QualificationRequirement, MTURK_PROD, MTURK_REGION, MTURK_SANDBOX, PAGE_SIZE,
};
use aws_sdk_mturk::config::Region;
use aws_sdk_mturk::error::DisplayErrorContext;
use aws_sdk_mturk::primitives::DateTime;
use aws_sdk_mturk::types::{self as sdk, Hit};
use aws_sdk_mturk::Client;
use std::future::Future;
use tokio::runtime::Runtime;
use tracing::debug;

pub struct MturkClient {
    runtime: Runtime,
    client: Client,
}

fn call_error<E>(operation: &'static str) -> impl FnOnce(E) -> MarketplaceError
where
    E: std::error::Error,
{
    move |e| MarketplaceError::Call {
        operation,
        message: DisplayErrorContext(&e).to_string(),
    }
}

fn summary(hit: &Hit) -> HitSummary {
    HitSummary {
        hit_id: hit.hit_id().unwrap_or_default().to_string(),
        group_id: hit.hit_group_id().unwrap_or_default().to_string(),
        expiration: hit.expiration().map(DateTime::secs),
    }
}

fn to_sdk_requirement(
    req: &QualificationRequirement,
) -> Result<sdk::QualificationRequirement, MarketplaceError> {
    let invalid =
        |e: aws_sdk_mturk::error::BuildError| MarketplaceError::InvalidRequest(e.to_string());
    let comparator = match req.comparator {
        Comparator::EqualTo => sdk::Comparator::EqualTo,
        Comparator::Exists => sdk::Comparator::Exists,
        Comparator::DoesNotExist => sdk::Comparator::DoesNotExist,
    };
    let mut builder = sdk::QualificationRequirement::builder()
        .qualification_type_id(&req.type_id)
        .comparator(comparator);
    if let Some(country) = &req.country {
        let locale = sdk::Locale::builder()
            .country(country)
            .build()
            .map_err(invalid)?;
        builder = builder.locale_values(locale);
    }
    if let Some(action) = req.actions_guarded {
        builder = builder.actions_guarded(match action {
            GuardedAction::Accept => sdk::HitAccessActions::Accept,
            GuardedAction::DiscoverPreviewAndAccept => {
                sdk::HitAccessActions::DiscoverPreviewAndAccept
            }
        });
    }
    builder.build().map_err(invalid)
}

impl MturkClient {
    /// Connect with the credentials of the named AWS profile, to the sandbox
    /// or the production requester endpoint.
    pub fn connect(profile: &str, sandbox: bool) -> Result<Self, MarketplaceError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let endpoint = if sandbox { MTURK_SANDBOX } else { MTURK_PROD };
        debug!(profile, endpoint, "connecting to mturk");
        let shared = runtime.block_on(
            aws_config::defaults(aws_config::BehaviorVersion::latest())
                .profile_name(profile)
                .region(Region::new(MTURK_REGION))
                .load(),
        );
        let conf = aws_sdk_mturk::config::Builder::from(&shared)
            .endpoint_url(endpoint)
            .build();
        Ok(MturkClient {
            runtime,
            client: Client::from_conf(conf),
        })
    }

    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }
}

impl Marketplace for MturkClient {
    fn account_balance(&self) -> Result<String, MarketplaceError> {
        let out = self
            .block_on(self.client.get_account_balance().send())
            .map_err(call_error("GetAccountBalance"))?;
        out.available_balance()
            .map(str::to_string)
            .ok_or(MarketplaceError::MissingField("AvailableBalance"))
    }

    fn create_hit(&self, req: &HitRequest) -> Result<HitSummary, MarketplaceError> {
        let requirements = req
            .qualification_requirements
            .iter()
            .map(to_sdk_requirement)
            .collect::<Result<Vec<_>, _>>()?;
        let call = self
            .client
            .create_hit()
            .title(&req.title)
            .description(&req.description)
            .keywords(&req.keywords)
            .reward(&req.reward)
            .max_assignments(req.max_assignments)
            .lifetime_in_seconds(req.lifetime_secs)
            .assignment_duration_in_seconds(req.assignment_duration_secs)
            .auto_approval_delay_in_seconds(req.auto_approval_delay_secs)
            .question(&req.question)
            .set_qualification_requirements(Some(requirements));
        let out = self
            .block_on(call.send())
            .map_err(call_error("CreateHIT"))?;
        out.hit()
            .map(summary)
            .ok_or(MarketplaceError::MissingField("HIT"))
    }

    fn get_hit(&self, hit_id: &str) -> Result<HitSummary, MarketplaceError> {
        let out = self
            .block_on(self.client.get_hit().hit_id(hit_id).send())
            .map_err(call_error("GetHIT"))?;
        out.hit()
            .map(summary)
            .ok_or(MarketplaceError::MissingField("HIT"))
    }

    fn list_hits(
        &self,
        qualification: Option<&str>,
        next_token: Option<&str>,
    ) -> Result<Page<HitSummary>, MarketplaceError> {
        let next_token = next_token.map(str::to_string);
        match qualification {
            None => {
                let out = self
                    .block_on(
                        self.client
                            .list_hits()
                            .max_results(PAGE_SIZE)
                            .set_next_token(next_token)
                            .send(),
                    )
                    .map_err(call_error("ListHITs"))?;
                Ok(Page {
                    items: out.hits().iter().map(summary).collect(),
                    next_token: out.next_token().map(str::to_string),
                })
            }
            Some(qualification) => {
                let out = self
                    .block_on(
                        self.client
                            .list_hits_for_qualification_type()
                            .qualification_type_id(qualification)
                            .max_results(PAGE_SIZE)
                            .set_next_token(next_token)
                            .send(),
                    )
                    .map_err(call_error("ListHITsForQualificationType"))?;
                Ok(Page {
                    items: out.hits().iter().map(summary).collect(),
                    next_token: out.next_token().map(str::to_string),
                })
            }
        }
    }

    fn expire_hit(&self, hit_id: &str) -> Result<(), MarketplaceError> {
        self.block_on(
            self.client
                .update_expiration_for_hit()
                .hit_id(hit_id)
                .expire_at(DateTime::from_secs(0))
                .send(),
        )
        .map_err(call_error("UpdateExpirationForHIT"))?;
        Ok(())
    }

    fn associate_qualification(
        &self,
        qualification: &str,
        worker_id: &str,
        value: i32,
        notify: bool,
    ) -> Result<(), MarketplaceError> {
        self.block_on(
            self.client
                .associate_qualification_with_worker()
                .qualification_type_id(qualification)
                .worker_id(worker_id)
                .integer_value(value)
                .send_notification(notify)
                .send(),
        )
        .map_err(call_error("AssociateQualificationWithWorker"))?;
        Ok(())
    }

    fn disassociate_qualification(
        &self,
        qualification: &str,
        worker_id: &str,
    ) -> Result<(), MarketplaceError> {
        self.block_on(
            self.client
                .disassociate_qualification_from_worker()
                .qualification_type_id(qualification)
                .worker_id(worker_id)
                .send(),
        )
        .map_err(call_error("DisassociateQualificationFromWorker"))?;
        Ok(())
    }

    fn list_workers_with_qualification(
        &self,
        qualification: &str,
        next_token: Option<&str>,
    ) -> Result<Page<String>, MarketplaceError> {
        let out = self
            .block_on(
                self.client
                    .list_workers_with_qualification_type()
                    .qualification_type_id(qualification)
                    .max_results(PAGE_SIZE)
                    .set_next_token(next_token.map(str::to_string))
                    .send(),
            )
            .map_err(call_error("ListWorkersWithQualificationType"))?;
        Ok(Page {
            items: out
                .qualifications()
                .iter()
                .filter_map(|q| q.worker_id())
                .map(str::to_string)
                .collect(),
            next_token: out.next_token().map(str::to_string),
        })
    }

    fn create_qualification_type(
        &self,
        name: &str,
        description: &str,
    ) -> Result<String, MarketplaceError> {
        let out = self
            .block_on(
                self.client
                    .create_qualification_type()
                    .name(name)
                    .description(description)
                    .qualification_type_status(sdk::QualificationTypeStatus::Active)
                    .send(),
            )
            .map_err(call_error("CreateQualificationType"))?;
        out.qualification_type()
            .and_then(|q| q.qualification_type_id())
            .map(str::to_string)
            .ok_or(MarketplaceError::MissingField("QualificationTypeId"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_requirement_converts() {
        let req = QualificationRequirement {
            type_id: "00000000000000000071".into(),
            comparator: Comparator::EqualTo,
            country: Some("US".into()),
            actions_guarded: None,
        };
        let converted = to_sdk_requirement(&req).unwrap();
        assert_eq!(converted.qualification_type_id(), "00000000000000000071");
        assert_eq!(converted.comparator(), &sdk::Comparator::EqualTo);
        assert_eq!(converted.locale_values().len(), 1);
        assert!(converted.actions_guarded().is_none());
    }
}
