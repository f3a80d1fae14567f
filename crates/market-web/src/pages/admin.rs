//! Admin Dashboard

use leptos::prelude::*;

use crate::api;
use crate::components::{ErrorText, SessionForm};

/// Review queue for products awaiting approval
#[component]
pub fn AdminDashboard() -> impl IntoView {
    let (pending, set_pending) = signal(None::<Result<Vec<api::Product>, String>>);
    let (version, set_version) = signal(0u32);

    Effect::new(move |_| {
        version.track();
        leptos::task::spawn_local(async move {
            set_pending.set(Some(api::pending_products().await));
        });
    });

    view! {
        <div class="dashboard admin">
            <h1>"Product review"</h1>
            {move || match pending.get() {
                None => view! { <p class="loading">"Loading..."</p> }.into_any(),
                Some(Err(e)) => view! { <p class="error">{e}</p> <SessionForm /> }.into_any(),
                Some(Ok(list)) if list.is_empty() => {
                    view! { <p class="empty">"Nothing to review"</p> }.into_any()
                }
                Some(Ok(list)) => list
                    .into_iter()
                    .map(|product| {
                        view! {
                            <ReviewCard
                                product=product
                                on_done=move || set_version.update(|v| *v += 1)
                            />
                        }
                    })
                    .collect_view()
                    .into_any(),
            }}
        </div>
    }
}

#[component]
fn ReviewCard(
    product: api::Product,
    on_done: impl Fn() + Copy + Send + Sync + 'static,
) -> impl IntoView {
    let (reason, set_reason) = signal(String::new());
    let (error, set_error) = signal(None::<String>);

    let approve_id = product.id.clone();
    let approve = move |_| {
        let id = approve_id.clone();
        leptos::task::spawn_local(async move {
            match api::approve_product(&id).await {
                Ok(_) => on_done(),
                Err(e) => set_error.set(Some(e)),
            }
        });
    };

    let reject_id = product.id.clone();
    let reject = move |_| {
        let id = reject_id.clone();
        let reason = reason.get();
        leptos::task::spawn_local(async move {
            match api::reject_product(&id, reason.trim()).await {
                Ok(_) => on_done(),
                Err(e) => set_error.set(Some(e)),
            }
        });
    };

    view! {
        <article class="review">
            <h3>{product.title}</h3>
            <p class="description">{product.description}</p>
            <div class="price">"$"{product.price}</div>
            <div class="actions">
                <button class="btn btn-primary" on:click=approve>"Approve"</button>
                <input
                    type="text"
                    placeholder="Rejection reason"
                    prop:value=move || reason.get()
                    on:input=move |ev| set_reason.set(event_target_value(&ev))
                />
                <button class="btn" on:click=reject>"Reject"</button>
            </div>
            <ErrorText error=error />
        </article>
    }
}
