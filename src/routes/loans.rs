//! Loan Endpoints
//!
//! HTTP surface of the ledger operations. Mutating endpoints take a signed
//! body (`Signed<T>`); reads are public.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    ledger::{JournalEntry, Loan, LoanStatus},
    routes::extract::Signed,
    types::Amount,
    AppState,
};

// ============ Request/Response Types ============

/// 대출 제안 요청
#[derive(Debug, Deserialize)]
pub struct OfferLoanRequest {
    /// 원금 (wei)
    pub amount: Amount,
    /// 이자율 (%)
    pub interest_rate: u32,
    /// 담보 (wei), 원금의 50% 이상
    pub collateral: Amount,
}

/// 첨부 금액 (takeLoan / completeLoan)
#[derive(Debug, Deserialize)]
pub struct AttachedValue {
    pub value: Amount,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRateRequest {
    pub interest_rate: u32,
}

/// 대출 조회 응답
#[derive(Debug, Serialize)]
pub struct LoanResponse {
    #[serde(flatten)]
    pub loan: Loan,
    pub status: LoanStatus,
    /// 현재 이자율 기준 상환 금액 (완료된 대출은 없음)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repayment: Option<Amount>,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        let repayment = if loan.completed {
            None
        } else {
            loan.repayment_amount().ok()
        };
        Self {
            status: loan.status(),
            repayment,
            loan,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RepaymentResponse {
    pub id: u64,
    pub principal: Amount,
    pub interest_rate: u32,
    pub interest: Amount,
    pub total: Amount,
}

/// 히스토리 쿼리 파라미터
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// 페이지 (0부터 시작)
    pub page: Option<u32>,
    /// 페이지 크기 (기본 20, 최대 100)
    pub limit: Option<u32>,
}

/// 히스토리 응답
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub id: u64,
    pub events: Vec<JournalEntry>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_next: bool,
}

// ============ Handlers ============

/// POST /loans
///
/// offerLoan: 서명한 주소가 lender
///
/// # Request
///
/// ```json
/// { "amount": "10000000000000000000", "interest_rate": 5, "collateral": "5000000000000000000" }
/// ```
pub async fn offer_loan(
    State(state): State<AppState>,
    Signed { caller, body }: Signed<OfferLoanRequest>,
) -> Result<(StatusCode, Json<LoanResponse>), ApiError> {
    let loan = state
        .ledger
        .offer_loan(caller, body.amount, body.interest_rate, body.collateral)
        .await?;

    Ok((StatusCode::CREATED, Json(loan.into())))
}

/// POST /loans/:id/take
///
/// takeLoan: `value`는 원금과 정확히 같아야 함
pub async fn take_loan(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Signed { caller, body }: Signed<AttachedValue>,
) -> Result<Json<LoanResponse>, ApiError> {
    let loan = state.ledger.take_loan(caller, id, body.value).await?;
    Ok(Json(loan.into()))
}

/// POST /loans/:id/complete
///
/// completeLoan: `value` = amount + amount * rate / 100
pub async fn complete_loan(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Signed { caller, body }: Signed<AttachedValue>,
) -> Result<Json<LoanResponse>, ApiError> {
    let loan = state.ledger.complete_loan(caller, id, body.value).await?;
    Ok(Json(loan.into()))
}

/// POST /loans/:id/interest-rate
pub async fn adjust_interest_rate(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Signed { caller, body }: Signed<AdjustRateRequest>,
) -> Result<Json<LoanResponse>, ApiError> {
    let loan = state
        .ledger
        .adjust_interest_rate(caller, id, body.interest_rate)
        .await?;
    Ok(Json(loan.into()))
}

/// GET /loans/:id
pub async fn get_loan(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<LoanResponse>, ApiError> {
    let loan = state.ledger.loan(id).await?;
    Ok(Json(loan.into()))
}

/// GET /loans/:id/repayment
///
/// 현재 이자율 기준 상환 견적
pub async fn get_repayment(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<RepaymentResponse>, ApiError> {
    let loan = state.ledger.loan(id).await?;
    let total = loan.repayment_amount()?;
    let interest = total
        .checked_sub(loan.amount)
        .ok_or(ApiError::InternalError)?;

    Ok(Json(RepaymentResponse {
        id,
        principal: loan.amount,
        interest_rate: loan.interest_rate,
        interest,
        total,
    }))
}

/// GET /loans/:id/history
///
/// 대출 이벤트 히스토리 (최신순, 페이지네이션)
pub async fn get_loan_history(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let page = query.page.unwrap_or(0);
    let limit = query.limit.unwrap_or(20).clamp(1, 100); // 최대 100개

    let (events, total) = state.ledger.history(id, page, limit).await?;
    let has_next = (u64::from(page) + 1) * u64::from(limit) < total;

    Ok(Json(HistoryResponse {
        id,
        events,
        pagination: Pagination {
            page,
            limit,
            total,
            has_next,
        },
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        Router,
    };
    use chrono::Duration;
    use ethers::signers::{LocalWallet, Signer};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::routes::test_support::TestApp;
    use crate::services::auth::test_support::{signed_headers, wallet};
    use crate::services::Clock;

    const TEN_ETH: &str = "10000000000000000000";
    const FIVE_ETH: &str = "5000000000000000000";
    const FOUR_ETH: &str = "4000000000000000000";
    const REPAYMENT: &str = "10500000000000000000";

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn signed(t: &TestApp, wallet: &LocalWallet, path: &str, body: Value) -> (StatusCode, Value) {
        let raw = serde_json::to_vec(&body).unwrap();
        // 서명은 결정적 (RFC 6979) → 같은 요청을 다시 보내려면 타임스탬프가 달라야 함
        t.clock.advance(Duration::seconds(1));
        let headers = signed_headers(wallet, "POST", path, t.clock.now().timestamp(), &raw).await;

        let mut request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json");
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }
        send(&t.app, request.body(Body::from(raw)).unwrap()).await
    }

    async fn get(t: &TestApp, path: &str) -> (StatusCode, Value) {
        send(&t.app, Request::get(path).body(Body::empty()).unwrap()).await
    }

    async fn offer(t: &TestApp, lender: &LocalWallet) -> (StatusCode, Value) {
        signed(
            t,
            lender,
            "/loans",
            json!({ "amount": TEN_ETH, "interest_rate": 5, "collateral": FIVE_ETH }),
        )
        .await
    }

    #[tokio::test]
    async fn test_offer_loan() {
        let t = TestApp::new().await;
        let lender = wallet();

        let (status, body) = offer(&t, &lender).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], 1);
        assert_eq!(body["lender"], format!("{:?}", lender.address()));
        assert_eq!(body["amount"], TEN_ETH);
        assert_eq!(body["interest_rate"], 5);
        assert_eq!(body["status"], "offered");
        assert_eq!(body["borrower"], Value::Null);

        let (status, body) = get(&t, "/loans/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collateral"], FIVE_ETH);
        assert_eq!(body["repayment"], REPAYMENT);
    }

    #[tokio::test]
    async fn test_offer_with_insufficient_collateral() {
        let t = TestApp::new().await;
        let (status, body) = signed(
            &t,
            &wallet(),
            "/loans",
            json!({ "amount": TEN_ETH, "interest_rate": 5, "collateral": FOUR_ETH }),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Collateral must be at least 50% of the loan amount");
        assert_eq!(body["code"], "INSUFFICIENT_COLLATERAL");
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let t = TestApp::new().await;
        let lender = wallet();
        let borrower = wallet();
        offer(&t, &lender).await;

        let (status, body) = signed(&t, &borrower, "/loans/1/take", json!({ "value": TEN_ETH })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["borrower"], format!("{:?}", borrower.address()));
        assert_eq!(body["status"], "active");

        let (_, quote) = get(&t, "/loans/1/repayment").await;
        assert_eq!(quote["total"], REPAYMENT);
        assert_eq!(quote["interest"], "500000000000000000");

        let (status, body) =
            signed(&t, &borrower, "/loans/1/complete", json!({ "value": REPAYMENT })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["completed"], true);
        assert_eq!(body["status"], "completed");

        let (status, body) =
            signed(&t, &borrower, "/loans/1/complete", json!({ "value": REPAYMENT })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "The loan has already been completed");

        let (status, body) = get(&t, "/loans/1/history").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 3);
        assert_eq!(body["events"][0]["event"]["event"], "LoanCompleted");
    }

    #[tokio::test]
    async fn test_take_after_due_date() {
        let t = TestApp::new().await;
        offer(&t, &wallet()).await;

        t.clock.advance(Duration::days(31));

        let (status, body) = signed(&t, &wallet(), "/loans/1/take", json!({ "value": TEN_ETH })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "The loan has expired");
    }

    #[tokio::test]
    async fn test_take_with_wrong_value() {
        let t = TestApp::new().await;
        offer(&t, &wallet()).await;

        let (status, body) = signed(&t, &wallet(), "/loans/1/take", json!({ "value": FIVE_ETH })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "The amount sent must match the loan amount");
    }

    #[tokio::test]
    async fn test_adjust_interest_rate_authorization() {
        let t = TestApp::new().await;
        let lender = wallet();
        let other = wallet();
        offer(&t, &lender).await;

        let (status, body) =
            signed(&t, &other, "/loans/1/interest-rate", json!({ "interest_rate": 10 })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Only the lender can adjust the interest rate");

        let (status, body) =
            signed(&t, &lender, "/loans/1/interest-rate", json!({ "interest_rate": 10 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["interest_rate"], 10);
        assert_eq!(body["repayment"], "11000000000000000000");
    }

    #[tokio::test]
    async fn test_unknown_loan_is_404() {
        let t = TestApp::new().await;
        let (status, body) = get(&t, "/loans/77").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "The loan does not exist");
    }

    #[tokio::test]
    async fn test_unsigned_request_is_401() {
        let t = TestApp::new().await;
        let request = Request::post("/loans")
            .header("content-type", "application/json")
            .header("x-caller-address", "0x1111111111111111111111111111111111111111")
            .body(Body::from(
                json!({ "amount": TEN_ETH, "interest_rate": 5, "collateral": FIVE_ETH }).to_string(),
            ))
            .unwrap();

        let (status, body) = send(&t.app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");
        assert_eq!(t.state.ledger.loan_count().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_amount_is_400() {
        let t = TestApp::new().await;
        let (status, _) = signed(
            &t,
            &wallet(),
            "/loans",
            json!({ "amount": 10, "interest_rate": 5, "collateral": FIVE_ETH }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_pagination() {
        let t = TestApp::new().await;
        let lender = wallet();
        offer(&t, &lender).await;
        for rate in 6..=8 {
            signed(&t, &lender, "/loans/1/interest-rate", json!({ "interest_rate": rate })).await;
        }

        let (_, body) = get(&t, "/loans/1/history?page=0&limit=2").await;
        assert_eq!(body["events"].as_array().unwrap().len(), 2);
        assert_eq!(body["pagination"]["total"], 4);
        assert_eq!(body["pagination"]["has_next"], true);
        assert_eq!(body["events"][0]["event"]["new_rate"], 8);

        let (_, body) = get(&t, "/loans/1/history?page=1&limit=2").await;
        assert_eq!(body["pagination"]["has_next"], false);
        assert_eq!(body["events"][1]["event"]["event"], "LoanOffered");
    }
}
