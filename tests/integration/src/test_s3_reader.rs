//! S3 reader integration tests.

#[cfg(test)]
mod tests {
    use http::header::{CONTENT_LENGTH, CONTENT_RANGE, ETAG, HeaderValue, RANGE};
    use http::{HeaderMap, StatusCode};
    use imgstore_core::testsuite::{ReaderSuite, test_data};
    use imgstore_core::utils::header_str;
    use imgstore_core::{BucketPolicy, StorageError, StorageReader};
    use imgstore_s3::S3Storage;

    use crate::{
        cleanup_bucket, ensure_bucket, put_object, reader_config, s3_client, s3_reader,
        test_bucket_name, test_png,
    };

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_pass_reader_suite() {
        let client = s3_client();
        let bucket = test_bucket_name("suite");
        ensure_bucket(&client, &bucket).await;
        let data = test_data();
        put_object(&client, &bucket, "images/data.bin", &data).await;

        let reader = s3_reader().await;
        ReaderSuite {
            reader: &reader,
            container: &bucket,
            key: "images/data.bin",
            data: &data,
            skip_partial_content_checks: false,
        }
        .run()
        .await;

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_read_range_of_seeded_png() {
        let client = s3_client();
        ensure_bucket(&client, "test").await;
        let png = test_png();
        put_object(&client, "test", "foo/test.png", &png).await;

        let reader = s3_reader().await;
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static("bytes=10-19"));
        let obj = reader
            .get_object(&headers, "test", "foo/test.png", "")
            .await
            .expect("get_object");

        assert_eq!(obj.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            header_str(&obj.headers, &CONTENT_RANGE),
            Some("bytes 10-19/32")
        );
        assert_eq!(header_str(&obj.headers, &CONTENT_LENGTH), Some("10"));
        let body = obj.body.expect("body").bytes().await.expect("read body");
        assert_eq!(&body[..], &png[10..20]);
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_return_stable_validators() {
        let client = s3_client();
        let bucket = test_bucket_name("stable");
        ensure_bucket(&client, &bucket).await;
        put_object(&client, &bucket, "a.png", &test_png()).await;

        let reader = s3_reader().await;
        let first = reader
            .get_object(&HeaderMap::new(), &bucket, "a.png", "")
            .await
            .expect("first");
        let second = reader
            .get_object(&HeaderMap::new(), &bucket, "a.png", "")
            .await
            .expect("second");
        assert_eq!(
            header_str(&first.headers, &ETAG),
            header_str(&second.headers, &ETAG)
        );

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_read_specific_version() {
        use aws_sdk_s3::types::{BucketVersioningStatus, VersioningConfiguration};

        let client = s3_client();
        let bucket = test_bucket_name("version");
        ensure_bucket(&client, &bucket).await;
        client
            .put_bucket_versioning()
            .bucket(&bucket)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .expect("enable versioning");

        let v1 = put_object(&client, &bucket, "img.png", b"first")
            .await
            .expect("v1 should have a version id");
        put_object(&client, &bucket, "img.png", b"second").await;

        let reader = s3_reader().await;
        let obj = reader
            .get_object(&HeaderMap::new(), &bucket, "img.png", &v1)
            .await
            .expect("get_object");
        assert_eq!(obj.status, StatusCode::OK);
        let body = obj.body.expect("body").bytes().await.expect("read body");
        assert_eq!(&body[..], b"first");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_deny_bucket_outside_policy() {
        let mut config = reader_config();
        config.buckets = BucketPolicy::builder().allowed(vec!["a".into()]).build();
        let reader = S3Storage::new(config).await.expect("reader");

        let err = reader
            .get_object(&HeaderMap::new(), "b", "foo/test.png", "")
            .await
            .expect_err("denied");
        assert!(matches!(err, StorageError::BucketDenied { backend: "S3", .. }));
    }
}
