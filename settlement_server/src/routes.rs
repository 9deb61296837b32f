//! Request handler definitions
//!
//! Define each route and its handler here. Provider webhooks live in [`crate::webhook_routes`].
//!
//! Every `/api` route sits behind the JWT middleware, so handlers can take [`JwtClaims`] as an argument. Routes that
//! need a particular role say so in their `route!` declaration, which wraps them in the ACL middleware.
//!
//! Handlers must not block the worker thread. Database calls, provider calls and file I/O are all async.
use actix_web::{
    get,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web,
    HttpResponse,
    Responder,
};
use chrono::{Datelike, Utc};
use log::*;
use settlement_common::Cents;
use settlement_engine::{
    db_types::{MerchantProfile, Role},
    invoice_objects::InvoiceDocument,
    payment_objects::{InitiationStatus, RefundOutcome},
    traits::{InvoiceManagement, Mailer, MerchantManagement, PaymentGateway, PaymentLedger, PayoutManagement},
    InvoiceApi,
    MerchantApi,
    PaymentFlowApi,
    PayoutApi,
};

use crate::{
    auth::JwtClaims,
    config::ReconciliationConfig,
    data_objects::{
        AmountQuery,
        CompletePayoutParams,
        FeeQuote,
        InvoiceForPayoutParams,
        InvoiceStatusParams,
        NewPaymentParams,
        NewPayoutParams,
        OptionalReasonParams,
        PayoutDetails,
        ReasonParams,
        YearQuery,
    },
    errors::ServerError,
    reconciliation_worker::reconcile_once,
};

// Actix cannot register generic handlers directly, so each one gets a route struct via the `route!` macro.
// `route!(name => Method "/path" impl <B: TraitA + TraitB, G: TraitC> requires [Role::Admin])` creates `NameRoute<B, G>`,
// which registers `name::<B, G>` at `/path`. The `requires` clause is optional.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl <$($gen:ident: $bound0:ident $(+ $bound:ident)*),+> requires [$($roles:expr),+]) => {
        paste::paste! {
            pub struct [<$name:camel Route>]<$($gen),+>(core::marker::PhantomData<fn() -> ($($gen,)+)>);

            impl<$($gen),+> [<$name:camel Route>]<$($gen),+> {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self {
                    Self(core::marker::PhantomData)
                }
            }

            impl<$($gen),+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$($gen),+>
            where
                $($gen: $bound0 $(+ $bound)* + 'static,)+
            {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name::<$($gen),+>)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl <$($gen:ident: $bound0:ident $(+ $bound:ident)*),+>) => {
        paste::paste! {
            pub struct [<$name:camel Route>]<$($gen),+>(core::marker::PhantomData<fn() -> ($($gen,)+)>);

            impl<$($gen),+> [<$name:camel Route>]<$($gen),+> {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self {
                    Self(core::marker::PhantomData)
                }
            }

            impl<$($gen),+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$($gen),+>
            where
                $($gen: $bound0 $(+ $bound)* + 'static,)+
            {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name::<$($gen),+>);
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Fees  ----------------------------------------------------
route!(fee_quote => Get "/fees/quote" impl <B: PaymentLedger, G: PaymentGateway>);
/// The fee split for a booking amount, in cents. The booking system shows this to payers before they commit, and it
/// is the same split the ledger applies when the payment succeeds.
pub async fn fee_quote<B, G>(
    query: web::Query<AmountQuery>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedger,
    G: PaymentGateway,
{
    let amount = Cents::from(query.amount);
    trace!("💻️ GET fee quote for {amount}");
    let split = api.quote(amount)?;
    Ok(HttpResponse::Ok().json(FeeQuote::new(split, &api.settings().currency)))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(create_payment => Post "/payments" impl <B: PaymentLedger, G: PaymentGateway> requires [Role::Booking]);
/// Opens a payment for a booking and creates the matching object at the provider.
///
/// * `201 Created`: the payer can continue with `client_action` (Stripe client secret or PayPal approval link).
/// * `202 Accepted`: the provider did not answer in time. The payment is settled by webhook or by reconciliation.
/// * `402 Payment Required`: the provider refused the payment. `message` is safe to show to the payer.
pub async fn create_payment<B, G>(
    body: web::Json<NewPaymentParams>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedger,
    G: PaymentGateway,
{
    let params = body.into_inner();
    debug!("💻️ POST payment for booking {} ({} via {})", params.booking_id, params.amount, params.provider);
    let initiation = api.create_payment(params.into()).await?;
    let response = match initiation.status {
        InitiationStatus::Started => HttpResponse::Created().json(initiation),
        InitiationStatus::InProgress => HttpResponse::Accepted().json(initiation),
        InitiationStatus::Failed => HttpResponse::PaymentRequired().json(initiation),
    };
    Ok(response)
}

route!(fetch_payment => Get "/payments/{id}" impl <B: PaymentLedger, G: PaymentGateway> requires [Role::Admin]);
pub async fn fetch_payment<B, G>(
    path: web::Path<i64>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedger,
    G: PaymentGateway,
{
    let id = path.into_inner();
    trace!("💻️ GET payment {id}");
    let payment = api.fetch_payment(id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Payment {id}")))?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(refund_payment => Post "/payments/{id}/refund" impl <B: PaymentLedger, G: PaymentGateway> requires [Role::Admin]);
/// Refunds a succeeded payment in full and reverses the merchant's credit for it.
///
/// Returns `202 Accepted` if the provider did not confirm the refund in time. The provider's refund webhook completes
/// it later.
pub async fn refund_payment<B, G>(
    path: web::Path<i64>,
    body: web::Json<ReasonParams>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedger,
    G: PaymentGateway,
{
    let id = path.into_inner();
    info!("💻️ POST refund for payment {id}: {}", body.reason);
    let response = match api.refund(id, &body.reason).await? {
        outcome @ RefundOutcome::Refunded(_) => HttpResponse::Ok().json(outcome),
        outcome @ RefundOutcome::Submitted(_) => HttpResponse::Accepted().json(outcome),
    };
    Ok(response)
}

//----------------------------------------------   Payouts  ----------------------------------------------------
route!(create_payout => Post "/payouts" impl <B: PayoutManagement> requires [Role::Admin]);
/// Creates a payout covering all of the merchant's pending payments. The approving admin is taken from the token.
pub async fn create_payout<B: PayoutManagement>(
    claims: JwtClaims,
    body: web::Json<NewPayoutParams>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    info!("💻️ POST payout for {} approved by {}", params.merchant_id, claims.sub);
    let payout = api.create_payout(params.into_new_payout(claims.sub)).await?;
    Ok(HttpResponse::Created().json(payout))
}

route!(fetch_payout => Get "/payouts/{id}" impl <B: PayoutManagement + PaymentLedger> requires [Role::Admin]);
pub async fn fetch_payout<B>(path: web::Path<i64>, api: web::Data<PayoutApi<B>>) -> Result<HttpResponse, ServerError>
where B: PayoutManagement + PaymentLedger {
    let id = path.into_inner();
    trace!("💻️ GET payout {id}");
    let (payout, payments) =
        api.payout_with_payments(id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Payout {id}")))?;
    Ok(HttpResponse::Ok().json(PayoutDetails { payout, payments }))
}

route!(start_payout => Patch "/payouts/{id}/start" impl <B: PayoutManagement> requires [Role::Admin]);
pub async fn start_payout<B: PayoutManagement>(
    path: web::Path<i64>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ PATCH start payout {id}");
    let payout = api.start_payout(id).await?;
    Ok(HttpResponse::Ok().json(payout))
}

route!(complete_payout => Patch "/payouts/{id}/complete" impl <B: PayoutManagement> requires [Role::Admin]);
pub async fn complete_payout<B: PayoutManagement>(
    path: web::Path<i64>,
    body: web::Json<CompletePayoutParams>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ PATCH complete payout {id} with reference {}", body.transaction_reference);
    let payout = api.complete_payout(id, &body.transaction_reference, body.notes.as_deref()).await?;
    Ok(HttpResponse::Ok().json(payout))
}

route!(cancel_payout => Patch "/payouts/{id}/cancel" impl <B: PayoutManagement> requires [Role::Admin]);
pub async fn cancel_payout<B: PayoutManagement>(
    path: web::Path<i64>,
    body: Option<web::Json<OptionalReasonParams>>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let reason = body.and_then(|b| b.into_inner().reason);
    debug!("💻️ PATCH cancel payout {id}");
    let payout = api.cancel_payout(id, reason.as_deref()).await?;
    Ok(HttpResponse::Ok().json(payout))
}

route!(fail_payout => Patch "/payouts/{id}/fail" impl <B: PayoutManagement> requires [Role::Admin]);
pub async fn fail_payout<B: PayoutManagement>(
    path: web::Path<i64>,
    body: web::Json<ReasonParams>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ PATCH fail payout {id}: {}", body.reason);
    let payout = api.fail_payout(id, &body.reason).await?;
    Ok(HttpResponse::Ok().json(payout))
}

//----------------------------------------------   Merchants  ----------------------------------------------------
route!(update_merchant_profile => Put "/merchants/{id}/profile" impl <B: MerchantManagement> requires [Role::Admin]);
/// Creates or replaces a merchant's billing profile. Invoices take a snapshot of it when they are issued.
pub async fn update_merchant_profile<B: MerchantManagement>(
    path: web::Path<String>,
    body: web::Json<MerchantProfile>,
    api: web::Data<MerchantApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let merchant_id = path.into_inner();
    debug!("💻️ PUT profile for {merchant_id}");
    let merchant = api.update_profile(&merchant_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(merchant))
}

route!(merchant_summary => Get "/merchants/{id}/summary" impl <B: MerchantManagement> requires [Role::Admin]);
pub async fn merchant_summary<B: MerchantManagement>(
    path: web::Path<String>,
    query: web::Query<YearQuery>,
    api: web::Data<MerchantApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let merchant_id = path.into_inner();
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    trace!("💻️ GET {year} summary for {merchant_id}");
    let summary = api.financial_summary(&merchant_id, year).await?;
    Ok(HttpResponse::Ok().json(summary))
}

//----------------------------------------------   Invoices  ----------------------------------------------------
route!(invoice_for_payout => Post "/invoices/for-payout" impl <B: InvoiceManagement, M: Mailer> requires [Role::Admin]);
/// Issues the invoice for a completed payout, renders its document and emails it to the merchant.
///
/// The invoice is created even if rendering or emailing fails. Check `document_path` and `email_status` in the
/// response, and use the regenerate and resend routes to retry.
pub async fn invoice_for_payout<B, M>(
    body: web::Json<InvoiceForPayoutParams>,
    api: web::Data<InvoiceApi<B, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: InvoiceManagement,
    M: Mailer,
{
    info!("💻️ POST invoice for payout {}", body.payout_id);
    let invoice = api.create_for_payout(body.payout_id).await?;
    Ok(HttpResponse::Created().json(invoice))
}

route!(fetch_invoice => Get "/invoices/{id}" impl <B: InvoiceManagement, M: Mailer> requires [Role::Admin]);
pub async fn fetch_invoice<B, M>(
    path: web::Path<i64>,
    api: web::Data<InvoiceApi<B, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: InvoiceManagement,
    M: Mailer,
{
    let id = path.into_inner();
    trace!("💻️ GET invoice {id}");
    let invoice = api.fetch_invoice(id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Invoice {id}")))?;
    Ok(HttpResponse::Ok().json(invoice))
}

route!(update_invoice_status => Patch "/invoices/{id}/status" impl <B: InvoiceManagement, M: Mailer> requires [Role::Admin]);
pub async fn update_invoice_status<B, M>(
    path: web::Path<i64>,
    body: web::Json<InvoiceStatusParams>,
    api: web::Data<InvoiceApi<B, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: InvoiceManagement,
    M: Mailer,
{
    let id = path.into_inner();
    debug!("💻️ PATCH invoice {id} status to {}", body.status);
    let invoice = api.update_status(id, body.status).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

route!(resend_invoice_email => Post "/invoices/{id}/resend-email" impl <B: InvoiceManagement, M: Mailer> requires [Role::Admin]);
pub async fn resend_invoice_email<B, M>(
    path: web::Path<i64>,
    api: web::Data<InvoiceApi<B, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: InvoiceManagement,
    M: Mailer,
{
    let id = path.into_inner();
    debug!("💻️ POST resend email for invoice {id}");
    let invoice = api.resend_email(id).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

route!(regenerate_invoice_document => Post "/invoices/{id}/regenerate-document" impl <B: InvoiceManagement, M: Mailer> requires [Role::Admin]);
pub async fn regenerate_invoice_document<B, M>(
    path: web::Path<i64>,
    api: web::Data<InvoiceApi<B, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: InvoiceManagement,
    M: Mailer,
{
    let id = path.into_inner();
    debug!("💻️ POST regenerate document for invoice {id}");
    let invoice = api.regenerate_document(id).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

route!(delete_invoice => Delete "/invoices/{id}" impl <B: InvoiceManagement, M: Mailer> requires [Role::Admin]);
/// Deletes a draft invoice. Issued invoices are never deleted; cancel them instead.
pub async fn delete_invoice<B, M>(
    path: web::Path<i64>,
    api: web::Data<InvoiceApi<B, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: InvoiceManagement,
    M: Mailer,
{
    let id = path.into_inner();
    info!("💻️ DELETE invoice {id}");
    let invoice = api.delete_invoice(id).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

route!(invoice_document => Get "/invoices/{id}/document" impl <B: InvoiceManagement, M: Mailer> requires [Role::Admin]);
pub async fn invoice_document<B, M>(
    path: web::Path<i64>,
    api: web::Data<InvoiceApi<B, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: InvoiceManagement,
    M: Mailer,
{
    let id = path.into_inner();
    trace!("💻️ GET document for invoice {id}");
    let document = api.document(id).await?;
    Ok(attachment(document))
}

fn attachment(document: InvoiceDocument) -> HttpResponse {
    let disposition = ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(document.filename)],
    };
    HttpResponse::Ok().content_type(document.content_type).insert_header(disposition).body(document.bytes)
}

//----------------------------------------------   Reconciliation  ----------------------------------------------------
route!(reconcile => Post "/reconcile" impl <B: PaymentLedger + MerchantManagement, G: PaymentGateway> requires [Role::Admin]);
/// Runs one reconciliation pass now, instead of waiting for the worker.
pub async fn reconcile<B, G>(
    flow: web::Data<PaymentFlowApi<B, G>>,
    merchants: web::Data<MerchantApi<B>>,
    config: web::Data<ReconciliationConfig>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedger + MerchantManagement,
    G: PaymentGateway,
{
    info!("💻️ POST reconcile");
    let summary = reconcile_once(flow.as_ref(), merchants.as_ref(), config.as_ref()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

//----------------------------------------------   Merchant owner views  -----------------------------------------------
route!(my_pending => Get "/my/pending" impl <B: MerchantManagement> requires [Role::Owner]);
/// The caller's pending earnings: what the next payout would cover.
pub async fn my_pending<B: MerchantManagement>(
    claims: JwtClaims,
    api: web::Data<MerchantApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let merchant_id = claims.merchant_id()?;
    trace!("💻️ GET pending summary for {merchant_id}");
    let summary = api.pending_summary(merchant_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(my_summary => Get "/my/summary" impl <B: MerchantManagement> requires [Role::Owner]);
/// The caller's balance with a monthly breakdown for `year` (default: the current year).
pub async fn my_summary<B: MerchantManagement>(
    claims: JwtClaims,
    query: web::Query<YearQuery>,
    api: web::Data<MerchantApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let merchant_id = claims.merchant_id()?;
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    trace!("💻️ GET {year} summary for {merchant_id}");
    let summary = api.financial_summary(merchant_id, year).await?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(my_payouts => Get "/my/payouts" impl <B: MerchantManagement> requires [Role::Owner]);
pub async fn my_payouts<B: MerchantManagement>(
    claims: JwtClaims,
    api: web::Data<MerchantApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let merchant_id = claims.merchant_id()?;
    trace!("💻️ GET payout history for {merchant_id}");
    let payouts = api.payout_history(merchant_id).await?;
    Ok(HttpResponse::Ok().json(payouts))
}

route!(my_invoices => Get "/my/invoices" impl <B: MerchantManagement> requires [Role::Owner]);
pub async fn my_invoices<B: MerchantManagement>(
    claims: JwtClaims,
    api: web::Data<MerchantApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let merchant_id = claims.merchant_id()?;
    trace!("💻️ GET invoices for {merchant_id}");
    let invoices = api.invoices(merchant_id).await?;
    Ok(HttpResponse::Ok().json(invoices))
}

route!(my_invoice_document => Get "/my/invoices/{id}/document" impl <B: InvoiceManagement, M: Mailer> requires [Role::Owner]);
/// Downloads one of the caller's invoices. Invoices belonging to other merchants are reported as not found.
pub async fn my_invoice_document<B, M>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<InvoiceApi<B, M>>,
) -> Result<HttpResponse, ServerError>
where
    B: InvoiceManagement,
    M: Mailer,
{
    let merchant_id = claims.merchant_id()?;
    let id = path.into_inner();
    trace!("💻️ GET document for invoice {id} by {merchant_id}");
    let owned = api.fetch_invoice(id).await?.map(|i| i.invoice.merchant_id == merchant_id).unwrap_or(false);
    if !owned {
        return Err(ServerError::NoRecordFound(format!("Invoice {id}")));
    }
    let document = api.document(id).await?;
    Ok(attachment(document))
}
