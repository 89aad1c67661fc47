//! HTTP transport for the editing service

use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::wire::{self, CropBody, EditBody, MappingBody, PickRequest, SwitchMaskRequest};
use super::{
    Capability, ColorVariant, CropPreview, CropRequest, EditRequest, EditResult, GenerateReference,
    GenerateRequest, Generation, MappingRequest, SearchHit, SearchRequest, SessionId, UploadOptions,
    UploadReceipt,
};
use crate::domain::{Granularity, PaletteEntry, PixelPoint, Raster, RegionPick, StyleHints};
use crate::error::{CapabilityError, CapabilityResult};

/// Client for the editing service REST API
#[derive(Debug, Clone)]
pub struct HttpCapability {
    client: Client,
    base: Url,
    api_prefix: String,
}

impl HttpCapability {
    /// Only connection establishment is bounded; operations may take as
    /// long as the service needs.
    pub fn new(server_url: &str, api_prefix: &str, connect_timeout: Duration) -> anyhow::Result<Self> {
        use anyhow::Context;

        let base = Url::parse(server_url)
            .with_context(|| format!("Invalid server URL: {server_url}"))?;
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base,
            api_prefix: format!("/{}", api_prefix.trim_matches('/')),
        })
    }

    fn endpoint(&self, path: &str) -> CapabilityResult<Url> {
        let prefix = if self.api_prefix == "/" { "" } else { &self.api_prefix };
        self.base
            .join(&format!("{prefix}{path}"))
            .map_err(|e| CapabilityError::Transport(format!("bad endpoint {path}: {e}")))
    }

    /// Resolve an image URL returned by the service
    fn resolve(&self, url: &str) -> CapabilityResult<Url> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(_) => self
                .base
                .join(url)
                .map_err(|e| CapabilityError::Transport(format!("bad image URL {url}: {e}"))),
        }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> CapabilityResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        log::debug!("POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        decode(response).await
    }

    async fn post_form<R>(&self, path: &str, query: &[(&str, String)], form: Form) -> CapabilityResult<R>
    where
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        log::debug!("POST {} (multipart)", url);
        let response = self
            .client
            .post(url)
            .query(query)
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }

    async fn upload_inner(&self, image: Raster, options: UploadOptions) -> CapabilityResult<UploadReceipt> {
        let query = [
            ("alpha_val", options.alpha_val.to_string()),
            ("white_threshold", options.white_threshold.to_string()),
            ("layer_count", options.layer_count.to_string()),
        ];
        let form = Form::new().part("file", png_part(&image)?);
        let resp: wire::UploadResponse = self.post_form("/interactive/upload", &query, form).await?;
        Ok(resp.into())
    }

    async fn pick_inner(&self, session: SessionId, point: PixelPoint) -> CapabilityResult<RegionPick> {
        let body = PickRequest {
            session_id: session.as_str(),
            x: point.x,
            y: point.y,
        };
        let resp: wire::PickResponse = self.post_json("/interactive/pick", &body).await?;
        resp.try_into()
    }

    async fn switch_inner(&self, session: SessionId, level: Granularity) -> CapabilityResult<RegionPick> {
        let body = SwitchMaskRequest {
            session_id: session.as_str(),
            mask_index: level.into(),
        };
        let resp: wire::PickResponse = self.post_json("/interactive/switch-mask", &body).await?;
        resp.try_into()
    }

    async fn edit_inner(&self, request: EditRequest) -> CapabilityResult<EditResult> {
        let body = EditBody {
            session_id: request.session_id.as_str(),
            layer: request.layer,
            prompt: &request.instruction,
        };
        let resp: wire::EditResponse = self.post_json("/interactive/edit", &body).await?;
        resp.try_into()
    }

    async fn palette_inner(&self, image: Raster, n_colors: u8) -> CapabilityResult<Vec<PaletteEntry>> {
        let form = Form::new()
            .part("file", png_part(&image)?)
            .text("n_colors", n_colors.to_string());
        let resp: wire::PaletteResponse = self.post_form("/color/extract-palette", &[], form).await?;
        Ok(resp.palette)
    }

    async fn mapping_inner(&self, request: MappingRequest) -> CapabilityResult<Raster> {
        let body = MappingBody::new(&request.image, &request.mapping)?;
        let resp: wire::ImageResponse = self.post_json("/color/apply-mapping", &body).await?;
        Ok(Raster::from_base64(&resp.result_base64)?)
    }

    async fn variants_inner(&self, image: Raster, n_colors: u8) -> CapabilityResult<Vec<ColorVariant>> {
        let form = Form::new()
            .part("file", png_part(&image)?)
            .text("n_colors", n_colors.to_string());
        let resp: wire::VariantsResponse = self.post_form("/color/generate-variants", &[], form).await?;
        resp.try_into()
    }

    async fn crop_inner(&self, request: CropRequest) -> CapabilityResult<CropPreview> {
        let body = CropBody::new(&request.image, &request.spec)?;
        let resp: wire::CropResponse = self.post_json("/crop/to-size", &body).await?;
        resp.try_into()
    }

    async fn generate_inner(&self, request: GenerateRequest) -> CapabilityResult<Generation> {
        let mut form = Form::new()
            .text("prompt", request.prompt)
            .text("n", request.count.to_string())
            .text("size", request.size);
        form = match request.reference {
            Some(GenerateReference::Image(image)) => form.part("file", png_part(&image)?),
            Some(GenerateReference::Url(url)) => form.text("reference_url", url),
            None => form,
        };
        let form = with_hints(form, &request.hints);
        let resp: wire::GenerateResponse = self.post_form("/generate", &[], form).await?;
        Ok(resp.into())
    }

    async fn search_inner(&self, request: SearchRequest) -> CapabilityResult<Vec<SearchHit>> {
        let mut form = Form::new().text("top_k", request.top_k.to_string());
        if let Some(text) = request.text {
            form = form.text("text", text);
        }
        if let Some(image) = &request.image {
            form = form.part("file", png_part(image)?);
        }
        let form = with_hints(form, &request.hints);
        let resp: wire::SearchResponse = self.post_form("/search", &[], form).await?;
        Ok(resp.results.into_iter().map(SearchHit::from).collect())
    }

    async fn fetch_inner(&self, url: String) -> CapabilityResult<Raster> {
        let url = self.resolve(&url)?;
        log::debug!("GET {}", url);
        let response = check_status(self.client.get(url).send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(Raster::decode(&bytes)?)
    }
}

fn png_part(image: &Raster) -> CapabilityResult<Part> {
    let png = image
        .to_png()
        .map_err(|e| CapabilityError::Decode(format!("failed to encode image: {e}")))?;
    Part::bytes(png)
        .file_name("image.png")
        .mime_str("image/png")
        .map_err(CapabilityError::from)
}

fn with_hints(form: Form, hints: &StyleHints) -> Form {
    hints
        .fields()
        .fold(form, |form, (key, value)| form.text(key.as_str(), value.to_string()))
}

/// Turn non-2xx responses into `Rejected`, carrying the service's detail
async fn check_status(response: Response) -> CapabilityResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CapabilityError::Rejected {
        status: status.as_u16(),
        detail: wire::error_detail(&body),
    })
}

async fn decode<R: DeserializeOwned>(response: Response) -> CapabilityResult<R> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| CapabilityError::Decode(e.to_string()))
}

impl Capability for HttpCapability {
    fn upload(&self, image: Raster, options: UploadOptions) -> BoxFuture<'_, CapabilityResult<UploadReceipt>> {
        self.upload_inner(image, options).boxed()
    }

    fn pick(&self, session: SessionId, point: PixelPoint) -> BoxFuture<'_, CapabilityResult<RegionPick>> {
        self.pick_inner(session, point).boxed()
    }

    fn switch_granularity(
        &self,
        session: SessionId,
        level: Granularity,
    ) -> BoxFuture<'_, CapabilityResult<RegionPick>> {
        self.switch_inner(session, level).boxed()
    }

    fn apply_edit(&self, request: EditRequest) -> BoxFuture<'_, CapabilityResult<EditResult>> {
        self.edit_inner(request).boxed()
    }

    fn extract_palette(
        &self,
        image: Raster,
        n_colors: u8,
    ) -> BoxFuture<'_, CapabilityResult<Vec<PaletteEntry>>> {
        self.palette_inner(image, n_colors).boxed()
    }

    fn apply_color_mapping(&self, request: MappingRequest) -> BoxFuture<'_, CapabilityResult<Raster>> {
        self.mapping_inner(request).boxed()
    }

    fn color_variants(
        &self,
        image: Raster,
        n_colors: u8,
    ) -> BoxFuture<'_, CapabilityResult<Vec<ColorVariant>>> {
        self.variants_inner(image, n_colors).boxed()
    }

    fn crop_to_size(&self, request: CropRequest) -> BoxFuture<'_, CapabilityResult<CropPreview>> {
        self.crop_inner(request).boxed()
    }

    fn generate(&self, request: GenerateRequest) -> BoxFuture<'_, CapabilityResult<Generation>> {
        self.generate_inner(request).boxed()
    }

    fn search(&self, request: SearchRequest) -> BoxFuture<'_, CapabilityResult<Vec<SearchHit>>> {
        self.search_inner(request).boxed()
    }

    fn fetch_image(&self, url: String) -> BoxFuture<'_, CapabilityResult<Raster>> {
        self.fetch_inner(url).boxed()
    }
}
