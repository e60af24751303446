use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    ResilientClient,
    errors::Error,
    request::{ApiRequest, FileUpload},
    retry::OperationKind,
    types::{
        Envelope, Requirement, RequirementsPayload, ResultRecord, ResultsPayload, UploadReceipt,
    },
};

fn result_path(id: &str) -> String {
    format!("/api/results/{}", urlencoding::encode(id))
}

impl ResilientClient {
    /// POST `/api/upload` as multipart with the extended upload timeout.
    pub async fn upload(&self, upload: FileUpload) -> Result<UploadReceipt, Error> {
        self.upload_request(upload, None::<fn(u64, u64)>).await
    }

    /// Like [`upload`](Self::upload), reporting `(sent, total)` bytes as the body streams.
    pub async fn upload_with_progress<F>(
        &self,
        upload: FileUpload,
        progress: F,
    ) -> Result<UploadReceipt, Error>
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        self.upload_request(upload, Some(progress)).await
    }

    async fn upload_request<F>(
        &self,
        upload: FileUpload,
        progress: Option<F>,
    ) -> Result<UploadReceipt, Error>
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        let file_name = upload.file_name.clone();
        let size = upload.data.len();
        let mut request = ApiRequest::post("/api/upload")
            .with_operation(OperationKind::Upload)
            .with_timeout(self.context().config().upload_timeout())
            .with_upload(upload);
        if let Some(progress) = progress {
            request = request.on_progress(progress);
        }
        let receipt = self
            .json::<Envelope<UploadReceipt>>(request)
            .await?
            .into_payload()?;
        info!(file_name = %file_name, bytes = size, result_id = ?receipt.result_id, "upload.complete");
        Ok(receipt)
    }

    pub async fn list_results(&self) -> Result<Vec<ResultRecord>, Error> {
        let request = ApiRequest::get("/api/results").with_operation(OperationKind::ListResults);
        let payload = self
            .json::<Envelope<ResultsPayload>>(request)
            .await?
            .into_payload()?;
        Ok(payload.results)
    }

    /// Accepts either a bare result object or `{success, result}`.
    pub async fn get_result(&self, id: &str) -> Result<ResultRecord, Error> {
        let request = ApiRequest::get(result_path(id)).with_operation(OperationKind::GetResult);
        let mut body = self.json::<Map<String, Value>>(request).await?;
        if matches!(body.get("success"), Some(Value::Bool(false))) {
            let envelope: Envelope<Map<String, Value>> =
                serde_json::from_value(Value::Object(body))?;
            envelope.into_payload()?;
            return Err(Error::Api("The server reported a failure".into()));
        }
        let record = match body.remove("result") {
            Some(Value::Object(inner)) => Value::Object(inner),
            Some(other) => {
                body.insert("result".into(), other);
                Value::Object(body)
            }
            None => Value::Object(body),
        };
        Ok(serde_json::from_value(record)?)
    }

    pub async fn download_result(&self, id: &str) -> Result<Bytes, Error> {
        let request = ApiRequest::get(format!("{}/download", result_path(id)))
            .with_operation(OperationKind::DownloadResult);
        let resp = self.execute(request).await?;
        Ok(resp.bytes().await?)
    }

    pub async fn delete_result(&self, id: &str) -> Result<(), Error> {
        let request = ApiRequest::delete(result_path(id)).with_operation(OperationKind::DeleteResult);
        self.json::<Envelope<Map<String, Value>>>(request)
            .await?
            .into_payload()?;
        info!(result_id = %id, "result.deleted");
        Ok(())
    }

    pub async fn list_requirements(&self) -> Result<Vec<Requirement>, Error> {
        let request =
            ApiRequest::get("/api/requirements").with_operation(OperationKind::ListRequirements);
        let payload = self
            .json::<Envelope<RequirementsPayload>>(request)
            .await?
            .into_payload()?;
        Ok(payload.requirements)
    }

    async fn json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, Error> {
        let resp = self.execute(request).await?;
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
