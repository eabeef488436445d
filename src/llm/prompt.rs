// src/llm/prompt.rs

use std::collections::HashMap;

use crate::types::{ModuleTag, TestCase};

#[derive(Debug, Clone)]
pub struct LlmPrompt {
    pub system: String,
    pub user: String,
}

/* ============================================================
   System prompts (stable, reused)
   ============================================================ */

pub fn testgen_system() -> String {
    "You are an expert QA UI/UX Test Engineer specializing in generating \
     comprehensive UI/UX test cases. Always output valid JSON only. Focus on \
     user interface testing, not backend or technical testing."
        .to_string()
}

pub fn codegen_system() -> String {
    "You are an expert UI test automation engineer. Generate clean, reliable \
     browser action scripts as JSON. Always use the correct URLs provided in \
     the prompt and output valid JSON only."
        .to_string()
}

pub fn estimate_system() -> String {
    "You are an expert QA manager who estimates test coverage needs accurately.".to_string()
}

/* ============================================================
   Batch test-case generation prompts
   ============================================================ */

const RECORD_FORMAT: &str = r#"
OUTPUT FORMAT - MUST be valid JSON array ONLY:
[
  {
    "description": "Verify health insurance selection button displays and is clickable",
    "steps": "1. Open the insurance selection page\n2. Locate the 'Health Insurance' button\n3. Verify button is visible and enabled\n4. Click on the button",
    "expected_result": "Button changes color on hover, page navigates to health insurance form, form fields are displayed correctly",
    "priority": "High"
  },
  ...
]
"#;

pub fn happy_path_prompt(brd: &str, count: usize) -> LlmPrompt {
    let mut out = String::new();

    out.push_str(&format!(
        "Analyze the following BRD (Business Requirements Document) and generate \
         EXACTLY {count} test cases focusing on UI/UX HAPPY PATH scenarios.\n\n"
    ));
    push_brd(&mut out, brd);

    out.push_str(
        "FOCUS AREAS FOR THIS BATCH:\n\
         1. Main user flows working correctly (navigation, form submission)\n\
         2. UI elements displaying properly (buttons, fields, labels, images)\n\
         3. Successful scenarios (user completes tasks without errors)\n\
         4. Page transitions and navigation between screens\n\
         5. Data display and presentation on UI\n\n",
    );

    out.push_str(
        "TEST CASE REQUIREMENTS:\n\
         - Focus ONLY on UI/UX testing (NOT backend/API/database)\n\
         - Test user interface elements: buttons, forms, fields, dropdowns, checkboxes\n\
         - Test user interactions: click, type, select, navigate\n\
         - Describe WHAT USER SEES and WHAT USER DOES on the UI\n\
         - Each test case MUST include:\n\
           * description: Clear UI-focused description\n\
           * steps: Detailed UI interaction steps (use \\n for line breaks)\n\
           * expected_result: What user sees on screen (UI feedback)\n\
           * priority: \"High\" for critical UI flows, \"Medium\" for secondary\n",
    );

    out.push_str(RECORD_FORMAT);
    push_important_tail(&mut out, count, "Focus on UI elements, user interactions, visual verification");

    LlmPrompt { system: testgen_system(), user: out }
}

pub fn validation_prompt(brd: &str, count: usize) -> LlmPrompt {
    let mut out = String::new();

    out.push_str(&format!(
        "Analyze the following BRD (Business Requirements Document) and generate \
         EXACTLY {count} test cases focusing on UI VALIDATION & USER INTERACTIONS.\n\n"
    ));
    push_brd(&mut out, brd);

    out.push_str(
        "FOCUS AREAS FOR THIS BATCH:\n\
         1. Form field validation (required fields, format validation, length limits)\n\
         2. Input field behaviors (placeholder text, error messages, success indicators)\n\
         3. Button states (enabled/disabled/loading states)\n\
         4. Dropdown/select behaviors (options display, selection feedback)\n\
         5. Checkbox/radio button interactions\n\
         6. Error message display and formatting\n\
         7. Tooltip and help text display\n\
         8. User input feedback (typing indicators, character counters)\n\n",
    );

    out.push_str(
        "TEST CASE REQUIREMENTS:\n\
         - Focus on UI VALIDATION and USER INTERACTION feedback\n\
         - Test what happens when user enters invalid/valid data\n\
         - Verify error messages and validation messages display correctly on UI\n\
         - Test field-level interactions (focus, blur, typing, selecting)\n\
         - Each test case MUST include:\n\
           * description: Clear UI validation scenario\n\
           * steps: Detailed interaction steps on UI\n\
           * expected_result: UI feedback user sees (error messages, visual indicators)\n\
           * priority: \"Medium\" for most validation tests\n",
    );

    out.push_str(RECORD_FORMAT);
    push_important_tail(&mut out, count, "Focus on UI validation feedback, not backend validation");

    LlmPrompt { system: testgen_system(), user: out }
}

pub fn edge_cases_prompt(brd: &str, count: usize) -> LlmPrompt {
    let mut out = String::new();

    out.push_str(&format!(
        "Analyze the following BRD (Business Requirements Document) and generate \
         EXACTLY {count} test cases focusing on UI EDGE CASES, RESPONSIVE DESIGN, \
         and CROSS-BROWSER testing.\n\n"
    ));
    push_brd(&mut out, brd);

    out.push_str(
        "FOCUS AREAS FOR THIS BATCH:\n\
         1. Boundary testing (max length inputs, special characters, very long text)\n\
         2. Responsive design (mobile, tablet, desktop views)\n\
         3. Browser compatibility (Chrome, Safari, Firefox, Edge)\n\
         4. UI edge cases (window resize, zoom in/out, orientation change)\n\
         5. Accessibility (keyboard navigation, tab order, screen reader support)\n\
         6. Visual regression (layout breaks, overlapping elements, cut-off text)\n\
         7. Empty states and loading states\n\n",
    );

    out.push_str(
        "TEST CASE REQUIREMENTS:\n\
         - Focus on EDGE CASES and CROSS-DEVICE testing\n\
         - Test UI behavior in unusual but valid scenarios\n\
         - Verify UI doesn't break under edge conditions\n\
         - Each test case MUST include:\n\
           * description: Clear edge case or responsive scenario\n\
           * steps: Detailed steps including device/browser context\n\
           * expected_result: UI behavior and layout expectations\n\
           * priority: \"Medium\" or \"Low\" based on criticality\n",
    );

    out.push_str(RECORD_FORMAT);
    push_important_tail(&mut out, count, "Focus on UI edge cases, responsive behavior, visual consistency");

    LlmPrompt { system: testgen_system(), user: out }
}

fn push_brd(out: &mut String, brd: &str) {
    out.push_str("BRD CONTENT:\n");
    out.push_str(brd);
    out.push_str("\n\n");
}

fn push_important_tail(out: &mut String, count: usize, focus_line: &str) {
    out.push_str(&format!(
        "\nIMPORTANT:\n\
         - Output ONLY the JSON array, no markdown, no explanations\n\
         - Generate EXACTLY {count} test cases\n\
         - Use Vietnamese if BRD is in Vietnamese\n\
         - {focus_line}\n\
         - NO technical/backend testing (no API, database, server tests)\n"
    ));
}

/* ============================================================
   Coverage estimation prompt
   ============================================================ */

pub fn estimate_prompt(sample: &str, generated_count: usize) -> LlmPrompt {
    let mut out = String::new();

    out.push_str(
        "Analyze this BRD and estimate the TOTAL number of UI/UX test cases \
         needed for COMPREHENSIVE coverage.\n\n",
    );
    push_brd(&mut out, sample);

    out.push_str(
        "Consider:\n\
         1. Number of screens/pages\n\
         2. Number of UI elements per screen (buttons, fields, dropdowns, etc.)\n\
         3. Number of user interactions (click, type, select, navigate)\n\
         4. Validation scenarios (required fields, format checks)\n\
         5. Edge cases (empty states, max length, special characters)\n\
         6. Responsive design testing (mobile, tablet, desktop)\n\
         7. Different user flows and paths\n\n\
         For example:\n\
         - Simple login page: 15-20 test cases\n\
         - Complex form with 10 fields: 40-50 test cases\n\
         - Multi-step wizard: 60-80 test cases\n\
         - Full insurance application: 80-120 test cases\n\n",
    );

    out.push_str(&format!("Currently generated: {generated_count} test cases\n\n"));
    out.push_str(
        "Return ONLY a single number representing the TOTAL test cases needed \
         for full UI/UX coverage:",
    );

    LlmPrompt { system: estimate_system(), user: out }
}

/* ============================================================
   Action-script generation prompt
   ============================================================ */

const STEP_SCHEMA: &str = r#"
SUPPORTED STEPS (field "op" selects the kind):
- {"op": "open", "url": "<full URL>"}                         navigate to a page
- {"op": "fill", "selector": "<css>", "value": "<text>"}      clear a field and type into it
- {"op": "click", "selector": "<css>"}                        click an element
- {"op": "press", "key": "<key name>"}                        press a keyboard key (e.g. "Enter")
- {"op": "select", "selector": "<css>", "value": "<option>"}  choose a dropdown option
- {"op": "wait_for", "selector": "<css>", "timeout_ms": N}    wait until a selector resolves
- {"op": "wait_load", "timeout_ms": N}                        wait for the page load to settle
- {"op": "sleep", "ms": N}                                    fixed pause
- {"op": "expect_visible", "selector": "<css>"}               assert an element is present
- {"op": "expect_text", "selector": "<css>", "contains": "<text>"}  assert element text
- {"op": "expect_url_contains", "fragment": "<text>"}         assert the current URL

Selectors may use the extension tag:has-text('label') to match by visible text.
"#;

pub struct CodegenContext<'a> {
    pub base_url: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub module: ModuleTag,
    pub module_urls: &'a HashMap<String, String>,
    pub locators: &'a HashMap<String, HashMap<String, String>>,
}

pub fn codegen_prompt(case: &TestCase, ctx: &CodegenContext<'_>) -> LlmPrompt {
    let mut out = String::new();

    out.push_str(
        "Generate a browser action script for the following UI test case.\n\n",
    );

    /* ---------- TEST CASE ---------- */
    out.push_str("TEST CASE INFORMATION:\n");
    out.push_str(&format!("- Test ID: {}\n", case.id));
    out.push_str(&format!("- Description: {}\n", case.description));
    out.push_str(&format!("- Steps: {}\n", case.steps));
    out.push_str(&format!("- Expected Result: {}\n", case.expected_result));
    out.push_str(&format!("- Priority: {}\n\n", case.priority));

    /* ---------- TARGET SITE ---------- */
    out.push_str("WEBSITE INFORMATION:\n");
    out.push_str(&format!("- Base URL: {}\n", ctx.base_url));
    out.push_str(&format!("- Login Username: {}\n", ctx.username));
    out.push_str(&format!("- Login Password: {}\n\n", ctx.password));

    out.push_str(&format!("MODULE DETECTED: {}\n\n", ctx.module.as_str()));

    /* ---------- URL MAP ---------- */
    out.push_str("AVAILABLE URLs FOR THIS MODULE:\n");
    out.push_str(&pretty_json(ctx.module_urls));
    out.push_str("\n\n");
    out.push_str(
        "IMPORTANT URL NOTES:\n\
         - Use the correct URL path from the mapping above\n\
         - For example, contract list page is: /account/contract (NOT /contract/list)\n\
         - Always use the full URL from the mapping above\n\
         - If a URL contains {id}, replace it with an actual ID when needed\n\n",
    );

    /* ---------- LOCATORS ---------- */
    out.push_str("AVAILABLE ELEMENT LOCATORS (use these when possible):\n");
    out.push_str(&pretty_json(ctx.locators));
    out.push_str("\n");

    out.push_str(STEP_SCHEMA);

    /* ---------- REQUIREMENTS ---------- */
    let entry = case.entry_name();
    out.push_str(&format!(
        "\nREQUIREMENTS:\n\
         1. Output ONLY a single JSON object: {{\"entry\": \"{entry}\", \"steps\": [...]}}\n\
         2. \"entry\" MUST be exactly \"{entry}\"\n\
         3. Use the provided locators when matching elements\n\
         4. Use the CORRECT URLs from the module mapping above\n\
         5. Add wait_for/wait_load steps before interacting with slow pages\n\
         6. End with at least one expect_* step verifying the expected result\n\
         7. Do NOT include login steps (the session is already authenticated)\n\n",
    ));

    out.push_str(
        "IMPORTANT NOTES:\n\
         - Use Vietnamese text matching with :has-text() for buttons/links\n\
         - Prefer selector fallbacks from the locators config\n\
         - Use reasonable timeouts (30000 ms default)\n\
         - Focus on the specific test case steps\n\n\
         Generate ONLY the JSON object, nothing else:",
    );

    LlmPrompt { system: codegen_system(), user: out }
}

fn pretty_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case() -> TestCase {
        let mut c = TestCase::new("TC001");
        c.description = "Verify contract list loads".into();
        c.steps = "1. Open contract list".into();
        c.expected_result = "Rows are visible".into();
        c.priority = "High".into();
        c
    }

    #[test]
    fn codegen_prompt_embeds_entry_and_urls() {
        let mut urls = HashMap::new();
        urls.insert("list".to_string(), "https://x.test/account/contract".to_string());
        let locators = HashMap::new();
        let ctx = CodegenContext {
            base_url: "https://x.test/",
            username: "qa",
            password: "secret",
            module: ModuleTag::Contract,
            module_urls: &urls,
            locators: &locators,
        };

        let prompt = codegen_prompt(&case(), &ctx);
        assert!(prompt.user.contains("\"entry\": \"test_tc001\""));
        assert!(prompt.user.contains("https://x.test/account/contract"));
        assert!(prompt.user.contains("MODULE DETECTED: contract"));
        assert!(prompt.user.contains("Login Username: qa"));
        assert!(prompt.system.contains("action scripts"));
    }

    #[test]
    fn batch_prompts_carry_exact_count() {
        let p = happy_path_prompt("some brd", 30);
        assert!(p.user.contains("EXACTLY 30 test cases"));
        assert!(p.user.contains("HAPPY PATH"));

        let p = validation_prompt("some brd", 25);
        assert!(p.user.contains("EXACTLY 25 test cases"));
        assert!(p.user.contains("VALIDATION"));

        let p = edge_cases_prompt("some brd", 40);
        assert!(p.user.contains("EXACTLY 40 test cases"));
        assert!(p.user.contains("EDGE CASES"));
    }

    #[test]
    fn estimate_prompt_reports_generated_count() {
        let p = estimate_prompt("brd text", 12);
        assert!(p.user.contains("Currently generated: 12 test cases"));
        assert!(p.user.contains("Return ONLY a single number"));
    }
}
