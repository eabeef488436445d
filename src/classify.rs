// src/classify.rs

use crate::types::ModuleTag;

/// Ordered keyword groups; first group with a hit wins, so overlap between
/// groups (e.g. "link" vs "deeplink") is resolved by position, not
/// specificity. Order must not change.
const KEYWORD_GROUPS: &[(ModuleTag, &[&str])] = &[
    (ModuleTag::Contract, &["hợp đồng", "ctv", "contract"]),
    (ModuleTag::Lead, &["lead", "khách hàng tiềm năng"]),
    (ModuleTag::Product, &["sản phẩm", "product"]),
    (ModuleTag::Deeplink, &["deeplink", "link"]),
    (ModuleTag::Report, &["báo cáo", "report", "dashboard"]),
    (ModuleTag::Settings, &["cài đặt", "setting", "kpi"]),
    (ModuleTag::Profile, &["profile", "hồ sơ", "tài khoản"]),
];

/// Map a test case's free text to the functional module it belongs to.
/// Pure function of (description, steps); defaults to `contract`.
pub fn detect_module(description: &str, steps: &str) -> ModuleTag {
    let description = description.to_lowercase();
    let steps = steps.to_lowercase();

    for (tag, keywords) in KEYWORD_GROUPS {
        if keywords
            .iter()
            .any(|kw| description.contains(kw) || steps.contains(kw))
        {
            return *tag;
        }
    }

    ModuleTag::Contract
}
