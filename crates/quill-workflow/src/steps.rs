//! The nine step actions of the publication workflow

use std::time::Duration;

use async_trait::async_trait;
use quill_browser::{PageDriver, Visibility};
use quill_core::{poll_until, PollConfig, QuillError, Result, RetryPolicy};
use tracing::{debug, info, warn};

use crate::step::{StepAction, StepReport};
use crate::workflow::WorkflowContext;

/// Launch: apply timeouts, user agent and headers to the fresh page
pub struct PreparePage;

#[async_trait]
impl<P: PageDriver> StepAction<P> for PreparePage {
    async fn run(&self, ctx: &WorkflowContext<'_, P>) -> Result<StepReport> {
        ctx.page.prepare().await?;
        Ok(StepReport::new())
    }
}

/// NavigateToAuthSurface: load the sign-in page and wait until it is ready
pub struct LoadAuthSurface;

#[async_trait]
impl<P: PageDriver> StepAction<P> for LoadAuthSurface {
    async fn run(&self, ctx: &WorkflowContext<'_, P>) -> Result<StepReport> {
        ctx.page
            .navigate(&ctx.site.auth_url, Some(ctx.timings.navigation_timeout()))
            .await?;

        let window = ctx.timings.poll.ready_state_ms;
        let ready = poll_until("document ready", ctx.poll(window), |_| async move {
            let state = ctx.page.ready_state().await?;
            Ok((state == "complete").then_some(()))
        })
        .await?;

        if ready.is_none() {
            return Err(QuillError::Timeout {
                operation: "document ready state".to_string(),
                elapsed: Duration::from_millis(window),
            });
        }
        Ok(StepReport::new().note(format!("sign-in surface loaded: {}", ctx.site.auth_url)))
    }
}

/// SubmitCredentials: fill both fields and press the sign-in button
pub struct EnterCredentials;

#[async_trait]
impl<P: PageDriver> StepAction<P> for EnterCredentials {
    async fn run(&self, ctx: &WorkflowContext<'_, P>) -> Result<StepReport> {
        let profile = ctx.profile;
        let locator = ctx.locator();
        let wait = ctx.poll(ctx.timings.poll.element_wait_ms);
        let mut report = StepReport::new();

        let fields = [
            (&profile.username_field, ctx.credentials.identity.as_str()),
            (&profile.password_field, ctx.credentials.secret.as_str()),
        ];
        for (descriptor, value) in fields {
            let field = locator
                .require(descriptor, Visibility::Visible, None, wait)
                .await?;
            ctx.page.click(&field.element).await?;
            ctx.page.clear(&field.element).await?;
            ctx.page.type_text(&field.element, value).await?;
            report.resolved(&field);
        }

        let submit = locator
            .require(&profile.login_submit, Visibility::Visible, None, wait)
            .await?;
        ctx.page.click(&submit.element).await?;
        report.resolved(&submit);
        debug!("Credentials submitted for {}", ctx.credentials.identity);

        ctx.settle(ctx.timings.settle.after_login_ms).await;
        Ok(report.note("credentials submitted"))
    }
}

/// ConfirmAuthenticated: the post-login location must leave the sign-in
/// surface without landing on a verification challenge
pub struct AwaitAuthentication;

#[async_trait]
impl<P: PageDriver> StepAction<P> for AwaitAuthentication {
    async fn run(&self, ctx: &WorkflowContext<'_, P>) -> Result<StepReport> {
        let site = ctx.site;
        let landed = poll_until(
            "post-login redirect",
            ctx.poll(ctx.timings.poll.auth_confirm_ms),
            |_| async move {
                let url = ctx.page.current_url().await?;
                if site.is_challenge(&url) {
                    return Err(QuillError::AuthenticationIncomplete(format!(
                        "additional verification required at {}",
                        url
                    )));
                }
                Ok((!site.is_auth_surface(&url)).then_some(url))
            },
        )
        .await?;

        match landed {
            Some(url) => {
                info!("Signed in, now at {}", url);
                Ok(StepReport::new().note(format!("authenticated: {}", url)))
            }
            None => Err(QuillError::AuthenticationIncomplete(
                "still on the sign-in surface after submitting credentials".to_string(),
            )),
        }
    }
}

/// NavigateToTargetSurface: go to the feed, or click back to it through a
/// home link when the direct navigation fails
pub struct LoadTargetSurface;

#[async_trait]
impl<P: PageDriver> StepAction<P> for LoadTargetSurface {
    async fn run(&self, ctx: &WorkflowContext<'_, P>) -> Result<StepReport> {
        let mut report = StepReport::new();

        let navigation = ctx
            .page
            .navigate(&ctx.site.target_url, Some(ctx.timings.navigation_timeout()))
            .await;
        if let Err(e) = navigation {
            warn!("Direct navigation to the target surface failed ({}), trying a home link", e);
            let link = ctx
                .locator()
                .locate_with_poll(
                    &ctx.profile.home_link,
                    Visibility::Any,
                    None,
                    ctx.poll(ctx.timings.poll.element_wait_ms),
                )
                .await
                .ok_or_else(|| {
                    QuillError::NavigationFailure(format!("{}; no home link to fall back on", e))
                })?;
            ctx.page.click(&link.element).await?;
            report.resolved(&link);
            report = report.note("target surface reached through a home link");
        }

        ctx.settle(ctx.timings.settle.after_target_ms).await;

        let url = ctx.page.current_url().await?;
        if ctx.site.is_auth_surface(&url) || ctx.site.is_challenge(&url) {
            return Err(QuillError::NavigationFailure(format!(
                "landed on {} instead of the target surface",
                url
            )));
        }
        Ok(report.note(format!("target surface: {}", url)))
    }
}

/// OpenComposer: find the trigger over several rounds, scrolling between
/// rounds, then fall back to any share-box container
pub struct OpenComposer;

#[async_trait]
impl<P: PageDriver> StepAction<P> for OpenComposer {
    async fn run(&self, ctx: &WorkflowContext<'_, P>) -> Result<StepReport> {
        let profile = ctx.profile;
        let locator = ctx.locator();
        let rounds = ctx.timings.poll.composer_rounds.max(1);
        let wait = ctx.poll(ctx.timings.poll.composer_wait_ms);

        let mut trigger = None;
        for round in 1..=rounds {
            trigger = locator
                .locate_with_poll(
                    &profile.composer_trigger,
                    Visibility::Visible,
                    Some(&profile.composer_trigger_filter),
                    wait,
                )
                .await;
            if trigger.is_some() || round == rounds {
                break;
            }
            debug!("Composer trigger not found in round {}/{}, scrolling", round, rounds);
            ctx.page.scroll_to(0, 300).await?;
            ctx.settle(ctx.timings.settle.after_composer_ms).await;
        }

        let trigger = match trigger {
            Some(found) => found,
            None => locator
                .locate(&profile.composer_entry, Visibility::Any, None)
                .await
                .ok_or_else(|| QuillError::not_found(profile.composer_trigger.name.as_str()))?,
        };

        ctx.page.click(&trigger.element).await?;
        info!(
            "Composer opened via {} (strategy {} of {})",
            trigger.target, trigger.strategy_index, trigger.strategy_kind
        );

        let mut report = StepReport::new();
        report.resolved(&trigger);
        ctx.settle(ctx.timings.settle.after_composer_ms).await;
        Ok(report)
    }
}

/// Line endings and surrounding whitespace differ between editors
fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").trim().to_string()
}

/// InjectContent: clear the editable region, insert the payload and read it
/// back
pub struct InjectContent;

#[async_trait]
impl<P: PageDriver> StepAction<P> for InjectContent {
    async fn run(&self, ctx: &WorkflowContext<'_, P>) -> Result<StepReport> {
        let profile = ctx.profile;
        let locator = ctx.locator();

        let editor = match locator
            .locate_with_poll(
                &profile.editor,
                Visibility::Visible,
                None,
                ctx.poll(ctx.timings.poll.editor_wait_ms),
            )
            .await
        {
            Some(found) => found,
            None => locator
                .locate(&profile.editor_by_label, Visibility::Any, None)
                .await
                .ok_or_else(|| QuillError::not_found(profile.editor.name.as_str()))?,
        };

        ctx.page.click(&editor.element).await?;
        ctx.settle(ctx.timings.settle.after_focus_ms).await;

        ctx.page.clear(&editor.element).await?;
        ctx.page.insert_text(&editor.element, ctx.content).await?;
        ctx.settle(ctx.timings.settle.after_typing_ms).await;

        let expected = normalize(ctx.content);
        let actual = normalize(&ctx.page.read_text(&editor.element).await?);
        if actual != expected {
            return Err(QuillError::ContentMismatch {
                expected: expected.chars().count(),
                actual: actual.chars().count(),
            });
        }

        let mut report = StepReport::new().note(format!(
            "content injected ({} chars)",
            expected.chars().count()
        ));
        report.resolved(&editor);
        Ok(report)
    }
}

/// SubmitContent: wait for an enabled publish button and click it once
pub struct SubmitContent;

#[async_trait]
impl<P: PageDriver> StepAction<P> for SubmitContent {
    async fn run(&self, ctx: &WorkflowContext<'_, P>) -> Result<StepReport> {
        let polls = &ctx.timings.poll;
        let policy = RetryPolicy::fixed(
            polls.submit_enable_attempts,
            Duration::from_millis(polls.submit_enable_interval_ms),
        );

        let button = policy
            .execute("enabled publish button", |_| async move {
                ctx.locator()
                    .require(
                        &ctx.profile.publish_button,
                        Visibility::Interactable,
                        Some(&ctx.profile.publish_filter),
                        PollConfig::once(),
                    )
                    .await
            })
            .await?;

        ctx.page.click(&button.element).await?;
        info!("Publish button clicked");

        let mut report = StepReport::new().note("submit control clicked");
        report.resolved(&button);
        ctx.settle(ctx.timings.settle.after_submit_ms).await;
        Ok(report)
    }
}

/// VerifySubmission: best-effort look for a confirmation toast. Never fails.
pub struct VerifySubmission;

#[async_trait]
impl<P: PageDriver> StepAction<P> for VerifySubmission {
    async fn run(&self, ctx: &WorkflowContext<'_, P>) -> Result<StepReport> {
        let profile = ctx.profile;
        let toast = ctx
            .locator()
            .locate_with_poll(
                &profile.success_indicator,
                Visibility::Any,
                Some(&profile.success_filter),
                ctx.poll(ctx.timings.poll.confirmation_ms),
            )
            .await;

        let report = match toast {
            Some(toast) => {
                info!("Publication confirmation detected");
                let mut report = StepReport::new().note("confirmation indicator detected");
                report.resolved(&toast);
                report
            }
            None => {
                warn!("No confirmation indicator observed; the submission still counts");
                StepReport::new().note("no confirmation indicator observed")
            }
        };
        Ok(report)
    }
}
