//! UI Components

use leptos::prelude::*;

use crate::api::{self, DonationForm, Product};

/// Inline error line, hidden while `error` is `None`
#[component]
pub fn ErrorText(error: ReadSignal<Option<String>>) -> impl IntoView {
    move || error.get().map(|e| view! { <p class="error">{e}</p> })
}

/// Listing card with Buy and trailer preview
#[component]
pub fn ProductCard(product: Product) -> impl IntoView {
    let (error, set_error) = signal(None::<String>);

    let buy_id = product.id.clone();
    let buy = move |_| {
        let id = buy_id.clone();
        leptos::task::spawn_local(async move {
            match api::checkout(&id).await {
                Ok(url) => api::redirect(&url),
                Err(e) => set_error.set(Some(e)),
            }
        });
    };

    let preview_id = product.id.clone();
    let preview = move |_| {
        let id = preview_id.clone();
        leptos::task::spawn_local(async move {
            match api::trailer(&id).await {
                Ok(url) => api::redirect(&url),
                Err(e) => set_error.set(Some(e)),
            }
        });
    };
    let has_trailer = product.trailer_url.is_some();

    view! {
        <article class="product">
            <h3>{product.title}</h3>
            <p class="description">{product.description}</p>
            <div class="price">"$"{product.price}</div>
            <div class="actions">
                <button class="btn btn-primary" on:click=buy>"Buy"</button>
                <Show when=move || has_trailer>
                    <button class="btn" on:click=preview.clone()>"Preview"</button>
                </Show>
            </div>
            <ErrorText error=error />
        </article>
    }
}

/// Session token entry for dashboards
#[component]
pub fn SessionForm() -> impl IntoView {
    let (token, set_token) = signal(String::new());

    let save = move |_| {
        api::set_session(token.get().trim());
        if let Some(window) = web_sys::window() {
            let _ = window.location().reload();
        }
    };

    view! {
        <div class="session">
            <p>"Sign in to continue"</p>
            <input
                type="password"
                placeholder="Session token"
                prop:value=move || token.get()
                on:input=move |ev| set_token.set(event_target_value(&ev))
            />
            <button class="btn btn-primary" on:click=save>"Sign in"</button>
        </div>
    }
}

/// Donation form; the link field is shown only when `coffee_link_id` is empty
#[component]
pub fn DonateForm(
    #[prop(into)] coffee_link_id: String,
    #[prop(optional)] presets: Vec<u32>,
) -> impl IntoView {
    let editable_link = coffee_link_id.is_empty();
    let (form, set_form) = signal(DonationForm {
        coffee_link_id,
        currency: "MWK".into(),
        ..DonationForm::default()
    });
    let (error, set_error) = signal(None::<String>);
    let (sending, set_sending) = signal(false);

    let submit = move |_| {
        if sending.get() {
            return;
        }
        set_sending.set(true);
        set_error.set(None);
        let form = form.get();
        leptos::task::spawn_local(async move {
            match api::donate(&form).await {
                Ok(url) => api::redirect(&url),
                Err(e) => set_error.set(Some(e)),
            }
            set_sending.set(false);
        });
    };

    let preset_buttons = presets
        .into_iter()
        .map(|amount| {
            view! {
                <button
                    class="btn preset"
                    on:click=move |_| set_form.update(|f| f.amount = amount.to_string())
                >
                    {amount}
                </button>
            }
        })
        .collect_view();

    view! {
        <div class="donate-form">
            <div class="presets">{preset_buttons}</div>
            <Show when=move || editable_link>
                <div class="field">
                    <label>"Coffee link"</label>
                    <input
                        type="text"
                        placeholder="coffee-xxxxxxxx"
                        prop:value=move || form.get().coffee_link_id
                        on:input=move |ev| set_form.update(|f| f.coffee_link_id = event_target_value(&ev))
                    />
                </div>
            </Show>
            <div class="field">
                <label>"Amount (MWK)"</label>
                <input
                    type="number"
                    min="1"
                    prop:value=move || form.get().amount
                    on:input=move |ev| set_form.update(|f| f.amount = event_target_value(&ev))
                />
            </div>
            <div class="field">
                <label>"Email"</label>
                <input
                    type="email"
                    prop:value=move || form.get().email
                    on:input=move |ev| set_form.update(|f| f.email = event_target_value(&ev))
                />
            </div>
            <div class="field">
                <label>"Name (optional)"</label>
                <input
                    type="text"
                    prop:value=move || form.get().donor_name
                    on:input=move |ev| set_form.update(|f| f.donor_name = event_target_value(&ev))
                />
            </div>
            <div class="field">
                <label>"Message (optional)"</label>
                <textarea
                    prop:value=move || form.get().message
                    on:input=move |ev| set_form.update(|f| f.message = event_target_value(&ev))
                />
            </div>
            <button class="btn btn-primary" on:click=submit disabled=move || sending.get()>
                {move || if sending.get() { "Redirecting..." } else { "Buy me a coffee ☕" }}
            </button>
            <ErrorText error=error />
        </div>
    }
}
