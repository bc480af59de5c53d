use actix_web::http::Method;
use actix_web::{web, HttpResponse};
use anyhow::anyhow;
use log::*;
use r2d2::Pool;
use serde_json::json;

use infra::ids::{Id, IdGen};
use infra::persistence::Storage;

use super::models::{Drink, DrinkPayload, Projection};
use super::store::DrinkRepository;
use crate::auth::{Claims, RequirePermission};
use crate::config::MenuConfig;
use crate::error::ApiError;

pub struct Menu<M: r2d2::ManageConnection> {
    db: Pool<M>,
    idgen: IdGen,
    detail_projection: Projection,
}

impl<M: r2d2::ManageConnection<Connection = D>, D: Storage + Send + 'static> Menu<M> {
    pub fn new(db: Pool<M>, config: &MenuConfig) -> Self {
        Menu {
            db,
            idgen: IdGen::new(),
            detail_projection: config.detail_projection,
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.service(
            web::resource("/drinks")
                .route({
                    let me = self.clone();
                    web::get().to(move || {
                        let me = me.clone();
                        async move { me.index().await }
                    })
                })
                .route({
                    let me = self.clone();
                    web::post()
                        .to(move |body: web::Bytes, claims: web::ReqData<Claims>| {
                            let me = me.clone();
                            async move { me.create(body, claims.into_inner()).await }
                        })
                        .wrap(RequirePermission::new("post:drinks"))
                })
                .route(web::method(Method::OPTIONS).to(crate::preflight)),
        )
        .service(
            web::resource("/drinks-detail")
                .route({
                    let me = self.clone();
                    web::get()
                        .to(move || {
                            let me = me.clone();
                            async move { me.detail().await }
                        })
                        .wrap(RequirePermission::new("get:drinks-detail"))
                })
                .route(web::method(Method::OPTIONS).to(crate::preflight)),
        )
        .service(
            web::resource("/drinks/{id}")
                .route({
                    let me = self.clone();
                    web::patch()
                        .to(
                            move |id: web::Path<String>,
                                  body: web::Bytes,
                                  claims: web::ReqData<Claims>| {
                                let me = me.clone();
                                async move {
                                    me.update(&id, body, claims.into_inner()).await
                                }
                            },
                        )
                        .wrap(RequirePermission::new("patch:drinks"))
                })
                .route({
                    let me = self.clone();
                    web::delete()
                        .to(move |id: web::Path<String>, claims: web::ReqData<Claims>| {
                            let me = me.clone();
                            async move { me.delete(&id, claims.into_inner()).await }
                        })
                        .wrap(RequirePermission::new("delete:drinks"))
                })
                .route(web::method(Method::OPTIONS).to(crate::preflight)),
        );
    }

    async fn index(&self) -> Result<HttpResponse, ApiError> {
        let drinks = self.in_pool(|docs| Ok(docs.list_all()?)).await?;
        debug!("Listing {} drinks", drinks.len());
        Ok(drink_list(&drinks, Projection::Short))
    }

    async fn detail(&self) -> Result<HttpResponse, ApiError> {
        let drinks = self.in_pool(|docs| Ok(docs.list_all()?)).await?;
        debug!(
            "Listing {} drinks in detail ({:?})",
            drinks.len(),
            self.detail_projection
        );
        Ok(drink_list(&drinks, self.detail_projection))
    }

    async fn create(&self, body: web::Bytes, claims: Claims) -> Result<HttpResponse, ApiError> {
        let payload = parse_payload(&body)?;
        if payload.is_empty() {
            debug!("Create without title or recipe");
            return Err(ApiError::BadRequest);
        }
        // A recipe on its own makes an untitled drink.
        let title = payload.title.unwrap_or_default();
        let recipe = payload.recipe.map(Vec::from).unwrap_or_default();

        let idgen = self.idgen.clone();
        let drink = self
            .in_pool(move |docs| Ok(docs.insert(&idgen, &title, recipe)?))
            .await?;
        info!("{:?} added {}", claims.sub, drink.id());

        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "drinks": drink.title(),
            "status_code": 200,
        })))
    }

    async fn update(
        &self,
        id: &str,
        body: web::Bytes,
        claims: Claims,
    ) -> Result<HttpResponse, ApiError> {
        let id = parse_id(id)?;
        let payload = parse_payload(&body)?;

        let drink = self
            .in_pool(move |docs| patch_drink(docs, &id, payload))
            .await?;
        info!("{:?} updated {}", claims.sub, drink.id());

        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "update": drink.id(),
            "status_code": 200,
        })))
    }

    async fn delete(&self, id: &str, claims: Claims) -> Result<HttpResponse, ApiError> {
        let id = parse_id(id)?;

        let removed = self.in_pool(move |docs| Ok(docs.delete(&id)?)).await?;
        if !removed {
            return Err(ApiError::NotFound);
        }
        info!("{:?} deleted {}", claims.sub, id);

        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "delete": id,
            "status_code": 200,
        })))
    }

    async fn in_pool<R, F>(&self, f: F) -> Result<R, ApiError>
    where
        R: Send + 'static,
        F: FnOnce(&mut D) -> Result<R, ApiError> + Send + 'static,
    {
        let db = self.db.clone();
        let res = web::block(move || -> Result<R, ApiError> {
            let mut docs = db.get().map_err(|e| anyhow!("get connection: {}", e))?;
            f(&mut *docs)
        })
        .await
        .map_err(|e| anyhow!("blocking task: {}", e))?;
        res
    }
}

impl<M: r2d2::ManageConnection> Clone for Menu<M> {
    fn clone(&self) -> Self {
        Menu {
            db: self.db.clone(),
            idgen: self.idgen.clone(),
            detail_projection: self.detail_projection,
        }
    }
}

fn drink_list(drinks: &[Drink], projection: Projection) -> HttpResponse {
    let drinks = drinks
        .iter()
        .map(|d| d.view(projection))
        .collect::<Vec<_>>();
    HttpResponse::Ok().json(json!({
        "success": true,
        "drinks": drinks,
        "status_code": 200,
    }))
}

fn patch_drink<D: Storage>(
    docs: &mut D,
    id: &Id<Drink>,
    payload: DrinkPayload,
) -> Result<Drink, ApiError> {
    let mut drink = docs.find_by_id(id)?.ok_or(ApiError::NotFound)?;
    drink.apply(payload);
    // The drink may be deleted between the load and the save.
    docs.update(&drink).map_err(|e| {
        if e.is_missing() {
            debug!("{} vanished during update", id);
            ApiError::NotFound
        } else {
            ApiError::from(e)
        }
    })?;
    Ok(drink)
}

fn parse_id(id: &str) -> Result<Id<Drink>, ApiError> {
    id.parse().map_err(|e| {
        debug!("Bad drink id {:?}: {}", id, e);
        ApiError::NotFound
    })
}

fn parse_payload(body: &[u8]) -> Result<DrinkPayload, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("Unparseable drink payload: {}", e);
        ApiError::BadRequest
    })
}
