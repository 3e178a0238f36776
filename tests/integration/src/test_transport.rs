//! Transport integration tests over the S3 reader.

#[cfg(test)]
mod tests {
    use http::header::{CONTENT_TYPE, ETAG, HeaderValue, IF_NONE_MATCH};
    use http::{HeaderMap, StatusCode};
    use imgstore_core::utils::header_str;
    use imgstore_transport::{Transport, TransportConfig};

    use crate::{
        cleanup_bucket, ensure_bucket, put_object, reader_config, s3_client, test_bucket_name,
        test_png,
    };

    async fn s3_transport() -> Transport {
        let config = TransportConfig::builder()
            .use_s3(true)
            .s3(reader_config())
            .build();
        Transport::from_config(&config).await.expect("transport")
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_round_trip_s3_url() {
        let client = s3_client();
        let bucket = test_bucket_name("transport");
        ensure_bucket(&client, &bucket).await;
        let png = test_png();
        put_object(&client, &bucket, "dir/with space.png", &png).await;

        let transport = s3_transport().await;
        assert!(transport.is_protocol_registered("s3"));

        let url = format!("s3://{bucket}/dir/with space.png");
        let response = transport
            .round_trip(&url, &HeaderMap::new())
            .await
            .expect("round trip");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(response.headers(), &CONTENT_TYPE), Some("image/png"));
        let etag = header_str(response.headers(), &ETAG)
            .expect("etag")
            .to_owned();
        let body = response.into_body().bytes().await.expect("read body");
        assert_eq!(&body[..], &png[..]);

        let mut headers = HeaderMap::new();
        headers.insert(IF_NONE_MATCH, HeaderValue::from_str(&etag).expect("etag"));
        let response = transport.round_trip(&url, &headers).await.expect("round trip");
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_render_missing_object() {
        let client = s3_client();
        let bucket = test_bucket_name("missing");
        ensure_bucket(&client, &bucket).await;

        let transport = s3_transport().await;
        let response = transport
            .round_trip(&format!("s3://{bucket}/nope.png"), &HeaderMap::new())
            .await
            .expect("round trip");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        cleanup_bucket(&client, &bucket).await;
    }
}
