// src/infrastructure/orders/mod.rs
// Order service repository implementation

use std::time::Duration;

use async_trait::async_trait;
use hyper::Method;
use rust_decimal::Decimal;

use crate::application::dto::{
    CreateOrderRequest, OrderPage, OrderSummary, Page, Product, RevenueResponse, User,
};
use crate::domain::errors::SourceResult;
use crate::domain::model::OrderStatus;
use crate::domain::repository::OrderLedger;
use crate::infrastructure::http::{BasicAuth, HttpJsonClient};

pub struct OrderServiceHttpRepository {
    http: HttpJsonClient,
}

impl OrderServiceHttpRepository {
    pub fn new(base_url: &str, auth: &BasicAuth, timeout: Duration) -> Self {
        Self {
            http: HttpJsonClient::new(base_url, timeout).with_basic_auth(auth),
        }
    }

    pub async fn list_orders(&self, page: u32, size: u32) -> SourceResult<OrderPage> {
        self.http
            .get(&format!("/orders?page={}&size={}", page, size))
            .await
    }

    pub async fn get_order(&self, id: &str) -> SourceResult<OrderSummary> {
        self.http.get(&format!("/orders/{}", id)).await
    }

    pub async fn create_order(&self, request: &CreateOrderRequest) -> SourceResult<OrderSummary> {
        let order: OrderSummary = self.http.send(Method::POST, "/orders", Some(request)).await?;
        log::info!("Created order {} ({})", order.order_number, order.id);
        Ok(order)
    }

    pub async fn update_order_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> SourceResult<OrderSummary> {
        let path = format!("/orders/{}/status?status={}", id, status.as_str());
        self.http.send::<(), _>(Method::PUT, &path, None).await
    }

    /// The service answers `204 No Content`
    pub async fn cancel_order(&self, id: &str) -> SourceResult<()> {
        self.http
            .send_discarding(Method::PUT, &format!("/orders/{}/cancel", id))
            .await?;
        log::info!("Cancelled order {}", id);
        Ok(())
    }

    pub async fn list_products(&self) -> SourceResult<Page<Product>> {
        self.http.get("/products").await
    }

    pub async fn list_users(&self) -> SourceResult<Page<User>> {
        self.http.get("/users").await
    }

    pub async fn revenue(&self) -> SourceResult<Decimal> {
        let response: RevenueResponse = self.http.get("/orders/analytics/revenue").await?;
        Ok(response.amount())
    }

    pub async fn order_count(&self, status: OrderStatus) -> SourceResult<u64> {
        self.http
            .get(&format!("/orders/analytics/count/{}", status.as_str()))
            .await
    }
}

#[async_trait]
impl OrderLedger for OrderServiceHttpRepository {
    async fn total_revenue(&self) -> SourceResult<Decimal> {
        self.revenue().await
    }

    async fn total_order_count(&self, page_size: u32) -> SourceResult<u64> {
        let page = self.list_orders(0, page_size).await?;
        Ok(page.total_elements)
    }
}
