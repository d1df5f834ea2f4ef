// Launching an exam as a batch of HITs that point at an external page.

use super::{
    Comparator, GuardedAction, HitRequest, HitSummary, Marketplace, MarketplaceError,
    QualificationRequirement,
};
use crate::api::json_text;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Built-in "worker locale" qualification.
pub const LOCALE_QUALIFICATION: &str = "00000000000000000071";
pub const MASTERS_PRODUCTION: &str = "2F1QJWKUDD8XADTFD2Q0G6UTO95ALH";
pub const MASTERS_SANDBOX: &str = "2ARFPLSP75KLA8M8DH1HTEQVJT3SY6";

pub const DEFAULT_FRAME_HEIGHT: u32 = 1600;

/// Launch file layout: the settings live under `mturk_config`.
#[derive(Deserialize, Debug)]
pub struct LaunchFile {
    pub mturk_config: MturkConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MturkConfig {
    #[serde(default)]
    pub sandbox: bool,
    #[serde(rename = "require_US", default)]
    pub require_us: bool,
    #[serde(default)]
    pub require_master: bool,
    #[serde(default)]
    pub include_qualifications: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_qualifications: Option<Vec<String>>,
    pub num_of_hits: u32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub keywords: String,
    pub reward_per_hit: Value,
    pub lifetime_min: Minutes,
    pub session_duration_min: Minutes,
    pub auto_approval_min: Minutes,
    #[serde(default = "default_assignments")]
    pub assignments_per_hit: i32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
}

fn default_assignments() -> i32 {
    1
}

fn default_frame_height() -> u32 {
    DEFAULT_FRAME_HEIGHT
}

impl LaunchFile {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MinutesError {
    #[error("`{0}` is not a number or a product like 60*24")]
    Malformed(String),
    #[error("`{0}` is too large")]
    Overflow(String),
}

/// A duration in minutes, written either as a number or as a product of
/// numbers (`"60*24*3"`).
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "MinutesRepr")]
pub struct Minutes(pub u64);

/// Raw JSON form of [`Minutes`].
#[derive(Deserialize)]
#[serde(untagged)]
pub enum MinutesRepr {
    Number(u64),
    Expr(String),
}

impl TryFrom<MinutesRepr> for Minutes {
    type Error = MinutesError;

    fn try_from(repr: MinutesRepr) -> Result<Self, Self::Error> {
        match repr {
            MinutesRepr::Number(n) => Ok(Minutes(n)),
            MinutesRepr::Expr(s) => s.parse(),
        }
    }
}

impl std::str::FromStr for Minutes {
    type Err = MinutesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut total: u64 = 1;
        for factor in s.split('*') {
            let n: u64 = factor
                .trim()
                .parse()
                .map_err(|_| MinutesError::Malformed(s.to_string()))?;
            total = total
                .checked_mul(n)
                .ok_or_else(|| MinutesError::Overflow(s.to_string()))?;
        }
        Ok(Minutes(total))
    }
}

impl Minutes {
    pub fn as_secs(self) -> i64 {
        i64::try_from(self.0.saturating_mul(60)).unwrap_or(i64::MAX)
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// ExternalQuestion document embedding `page_url` in the worker's frame.
pub fn external_question(page_url: &str, frame_height: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ExternalQuestion xmlns="http://mechanicalturk.amazonaws.com/AWSMechanicalTurkDataSchemas/2006-07-14/ExternalQuestion.xsd">
  <ExternalURL>{}</ExternalURL>
  <FrameHeight>{}</FrameHeight>
</ExternalQuestion>
"#,
        xml_escape(page_url),
        frame_height
    )
}

pub fn qualification_requirements(conf: &MturkConfig) -> Vec<QualificationRequirement> {
    let mut reqs = Vec::new();
    if conf.require_us {
        reqs.push(QualificationRequirement {
            type_id: LOCALE_QUALIFICATION.to_string(),
            comparator: Comparator::EqualTo,
            country: Some("US".to_string()),
            actions_guarded: None,
        });
    }
    if conf.require_master {
        let masters = if conf.sandbox {
            MASTERS_SANDBOX
        } else {
            MASTERS_PRODUCTION
        };
        reqs.push(QualificationRequirement {
            type_id: masters.to_string(),
            comparator: Comparator::Exists,
            country: None,
            actions_guarded: None,
        });
    }
    for q in conf.include_qualifications.iter().flatten() {
        reqs.push(QualificationRequirement {
            type_id: q.clone(),
            comparator: Comparator::Exists,
            country: None,
            actions_guarded: Some(GuardedAction::Accept),
        });
    }
    for q in conf.exclude_qualifications.iter().flatten() {
        reqs.push(QualificationRequirement {
            type_id: q.clone(),
            comparator: Comparator::DoesNotExist,
            country: None,
            actions_guarded: Some(GuardedAction::DiscoverPreviewAndAccept),
        });
    }
    reqs
}

pub fn hit_request(conf: &MturkConfig, page_url: &str) -> HitRequest {
    HitRequest {
        title: conf.title.clone(),
        description: conf.description.clone(),
        keywords: conf.keywords.clone(),
        reward: json_text(&conf.reward_per_hit),
        max_assignments: conf.assignments_per_hit,
        lifetime_secs: conf.lifetime_min.as_secs(),
        assignment_duration_secs: conf.session_duration_min.as_secs(),
        auto_approval_delay_secs: conf.auto_approval_min.as_secs(),
        question: external_question(page_url, conf.frame_height),
        qualification_requirements: qualification_requirements(conf),
    }
}

/// Worker-facing preview page of a HIT group.
pub fn preview_url(sandbox: bool, group_id: &str) -> String {
    let host = if sandbox { "workersandbox" } else { "worker" };
    format!("https://{}.mturk.com/mturk/preview?groupId={}", host, group_id)
}

#[derive(Debug, Default)]
pub struct LaunchOutcome {
    pub hits: Vec<HitSummary>,
    pub preview_urls: BTreeSet<String>,
}

/// Create `num_of_hits` HITs for the exam page. Stops at the first failed
/// creation since later ones would fail the same way.
pub fn launch_exam<M: Marketplace + ?Sized>(
    market: &M,
    conf: &MturkConfig,
    page_url: &str,
) -> Result<LaunchOutcome, MarketplaceError> {
    let req = hit_request(conf, page_url);
    info!(requirements = ?req.qualification_requirements, "qualification requirements");
    let mut outcome = LaunchOutcome::default();
    for _ in 0..conf.num_of_hits {
        let hit = market.create_hit(&req)?;
        outcome.preview_urls.insert(preview_url(conf.sandbox, &hit.group_id));
        outcome.hits.push(hit);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(extra: Value) -> MturkConfig {
        let mut base = json!({
            "sandbox": true,
            "require_US": true,
            "require_master": true,
            "include_qualifications": ["INC1"],
            "exclude_qualifications": null,
            "num_of_hits": 2,
            "title": "Exam",
            "description": "Take the exam",
            "keywords": "exam,nlp",
            "reward_per_hit": 0.5,
            "lifetime_min": "60*24",
            "session_duration_min": 30,
            "auto_approval_min": "60 * 24 * 3"
        });
        if let (Some(obj), Value::Object(extra)) = (base.as_object_mut(), extra) {
            obj.extend(extra);
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn minute_expressions_evaluate() {
        assert_eq!("60*24".parse::<Minutes>().unwrap(), Minutes(1440));
        assert_eq!(" 15 ".parse::<Minutes>().unwrap(), Minutes(15));
        assert!(matches!("60+1".parse::<Minutes>(), Err(MinutesError::Malformed(_))));
        assert_eq!(Minutes(2).as_secs(), 120);
    }

    #[test]
    fn hit_request_uses_config() {
        let conf = sample(json!({}));
        let req = hit_request(&conf, "https://x.org/exam?a=1&b=2");
        assert_eq!(req.reward, "0.5");
        assert_eq!(req.lifetime_secs, 1440 * 60);
        assert_eq!(req.assignment_duration_secs, 30 * 60);
        assert_eq!(req.auto_approval_delay_secs, 4320 * 60);
        assert_eq!(req.max_assignments, 1);
        assert!(req.question.contains("<ExternalURL>https://x.org/exam?a=1&amp;b=2</ExternalURL>"));
        assert!(req.question.contains("<FrameHeight>1600</FrameHeight>"));
    }

    #[test]
    fn requirements_follow_flags() {
        let reqs = qualification_requirements(&sample(json!({"exclude_qualifications": ["EXC1"]})));
        let ids: Vec<&str> = reqs.iter().map(|r| r.type_id.as_str()).collect();
        assert_eq!(ids, vec![LOCALE_QUALIFICATION, MASTERS_SANDBOX, "INC1", "EXC1"]);
        assert_eq!(reqs[0].country.as_deref(), Some("US"));
        assert_eq!(reqs[2].actions_guarded, Some(GuardedAction::Accept));
        assert_eq!(reqs[3].comparator, Comparator::DoesNotExist);

        let prod = qualification_requirements(&sample(json!({"sandbox": false, "require_US": false})));
        assert_eq!(prod[0].type_id, MASTERS_PRODUCTION);
    }

    #[test]
    fn preview_url_depends_on_sandbox() {
        assert_eq!(
            preview_url(true, "G1"),
            "https://workersandbox.mturk.com/mturk/preview?groupId=G1"
        );
        assert_eq!(preview_url(false, "G1"), "https://worker.mturk.com/mturk/preview?groupId=G1");
    }
}
